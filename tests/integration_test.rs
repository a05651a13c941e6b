use kafka_leader_client::{
    adapters::protocol::constants::{FETCH_KEY, LIST_OFFSETS_KEY, METADATA_KEY},
    adapters::protocol::parser::RecordBatchBuilder,
    BrokerAddress, ClientError, Configuration, ConnectionFactory, FetchRequest, KafkaMessage,
    KafkaTemplate, Partition, ReferenceTime, Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// 토픽 "orders": 파티션 0은 노드 0, 파티션 1은 노드 1이 리더
struct FakeCluster {
    ports: Vec<u16>,
    metadata_requests: Arc<AtomicUsize>,
}

impl FakeCluster {
    async fn start() -> FakeCluster {
        let mut listeners = Vec::new();
        for _ in 0..2 {
            listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
        }
        let ports: Vec<u16> = listeners.iter().map(|l| l.local_addr().unwrap().port()).collect();
        let metadata_requests = Arc::new(AtomicUsize::new(0));

        for (node_id, listener) in listeners.into_iter().enumerate() {
            let ports = ports.clone();
            let metadata_requests = Arc::clone(&metadata_requests);
            tokio::spawn(async move {
                loop {
                    let (stream, _) = listener.accept().await.unwrap();
                    let ports = ports.clone();
                    let metadata_requests = Arc::clone(&metadata_requests);
                    tokio::spawn(serve(stream, node_id, ports, metadata_requests));
                }
            });
        }

        FakeCluster {
            ports,
            metadata_requests,
        }
    }

    fn broker(&self, node_id: usize) -> BrokerAddress {
        BrokerAddress::new("127.0.0.1", self.ports[node_id]).unwrap()
    }

    fn seeds(&self) -> String {
        format!("127.0.0.1:{},127.0.0.1:{}", self.ports[0], self.ports[1])
    }
}

async fn serve(
    mut stream: tokio::net::TcpStream,
    node_id: usize,
    ports: Vec<u16>,
    metadata_requests: Arc<AtomicUsize>,
) {
    loop {
        let mut size = [0u8; 4];
        if stream.read_exact(&mut size).await.is_err() {
            return;
        }
        let mut request = vec![0u8; i32::from_be_bytes(size) as usize];
        if stream.read_exact(&mut request).await.is_err() {
            return;
        }

        let api_key = i16::from_be_bytes([request[0], request[1]]);
        let mut body = request[4..8].to_vec(); // correlation id
        match api_key {
            METADATA_KEY => {
                metadata_requests.fetch_add(1, Ordering::SeqCst);
                metadata_body(&mut body, &ports);
            }
            FETCH_KEY => fetch_body(&mut body, node_id),
            LIST_OFFSETS_KEY => list_offsets_body(&mut body, node_id),
            _ => return,
        }

        let mut frame = (body.len() as i32).to_be_bytes().to_vec();
        frame.extend_from_slice(&body);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as i16).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
}

fn metadata_body(buf: &mut Vec<u8>, ports: &[u16]) {
    buf.extend_from_slice(&(ports.len() as i32).to_be_bytes());
    for (node_id, port) in ports.iter().enumerate() {
        buf.extend_from_slice(&(node_id as i32).to_be_bytes());
        put_string(buf, "127.0.0.1");
        buf.extend_from_slice(&(*port as i32).to_be_bytes());
        buf.extend_from_slice(&(-1i16).to_be_bytes()); // rack
    }
    buf.extend_from_slice(&0i32.to_be_bytes()); // controller

    buf.extend_from_slice(&1i32.to_be_bytes());
    buf.extend_from_slice(&0i16.to_be_bytes());
    put_string(buf, "orders");
    buf.push(0);
    buf.extend_from_slice(&2i32.to_be_bytes());
    for partition in 0..2i32 {
        buf.extend_from_slice(&0i16.to_be_bytes());
        buf.extend_from_slice(&partition.to_be_bytes());
        buf.extend_from_slice(&partition.to_be_bytes()); // leader == partition index
        buf.extend_from_slice(&1i32.to_be_bytes());
        buf.extend_from_slice(&partition.to_be_bytes());
        buf.extend_from_slice(&1i32.to_be_bytes());
        buf.extend_from_slice(&partition.to_be_bytes());
    }
}

/// 각 노드는 자신이 리더인 파티션에 메시지 3개를 가지고 있음
fn fetch_body(buf: &mut Vec<u8>, node_id: usize) {
    let records = RecordBatchBuilder::new(0)
        .record(Some(&b"k0"[..]), Some(&b"zero"[..]))
        .record(Some(&b"k1"[..]), Some(&b"one"[..]))
        .record(Some(&b"k2"[..]), Some(&b"two"[..]))
        .build();

    buf.extend_from_slice(&0i32.to_be_bytes()); // throttle
    buf.extend_from_slice(&1i32.to_be_bytes());
    put_string(buf, "orders");
    buf.extend_from_slice(&1i32.to_be_bytes());
    buf.extend_from_slice(&(node_id as i32).to_be_bytes());
    buf.extend_from_slice(&0i16.to_be_bytes());
    buf.extend_from_slice(&3i64.to_be_bytes()); // high watermark
    buf.extend_from_slice(&3i64.to_be_bytes());
    buf.extend_from_slice(&(-1i32).to_be_bytes()); // aborted transactions
    buf.extend_from_slice(&(records.len() as i32).to_be_bytes());
    buf.extend_from_slice(&records);
}

fn list_offsets_body(buf: &mut Vec<u8>, node_id: usize) {
    buf.extend_from_slice(&1i32.to_be_bytes());
    put_string(buf, "orders");
    buf.extend_from_slice(&1i32.to_be_bytes());
    buf.extend_from_slice(&(node_id as i32).to_be_bytes());
    buf.extend_from_slice(&0i16.to_be_bytes());
    buf.extend_from_slice(&(-1i64).to_be_bytes());
    buf.extend_from_slice(&3i64.to_be_bytes());
}

#[tokio::test]
async fn test_leaders_fetch_and_reconnect_over_tcp() -> Result<()> {
    let cluster = FakeCluster::start().await;
    let factory = Arc::new(ConnectionFactory::new(Configuration::from_brokers(&cluster.seeds())?));
    let template = KafkaTemplate::new(Arc::clone(&factory));

    let p0 = Partition::new("orders", 0);
    let p1 = Partition::new("orders", 1);

    // 한 번의 메타데이터 갱신으로 두 리더를 모두 찾음
    let leaders = factory.get_leaders(&[p0.clone(), p1.clone()]).await?;
    assert_eq!(leaders[&p0], cluster.broker(0));
    assert_eq!(leaders[&p1], cluster.broker(1));
    assert_eq!(cluster.metadata_requests.load(Ordering::SeqCst), 1);

    // 요청한 오프셋 이전의 메시지는 걸러짐
    let result = template.receive(&[FetchRequest::new(p0.clone(), 1, 64 * 1024)?]).await?;
    let batch = result.result(&p0).unwrap();
    let offsets: Vec<i64> = batch.messages().iter().map(KafkaMessage::offset).collect();
    assert_eq!(offsets, vec![1, 2]);
    assert_eq!(batch.messages()[0].payload.as_deref(), Some(&b"one"[..]));
    assert_eq!(batch.high_watermark(), 3);

    // 리더가 다른 파티션은 한 번에 받을 수 없음
    let err = template
        .receive(&[
            FetchRequest::new(p0.clone(), 0, 1024)?,
            FetchRequest::new(p1.clone(), 0, 1024)?,
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));

    let latest = factory
        .connect(&cluster.broker(1))
        .await
        .fetch_initial_offset(ReferenceTime::Latest, &[p1.clone()])
        .await?;
    assert_eq!(latest.result(&p1), Some(&3));

    // 연결을 끊으면 새 연결이 만들어짐
    let first = factory.connect(&cluster.broker(0)).await;
    factory.disconnect(&cluster.broker(0)).await;
    let second = factory.connect(&cluster.broker(0)).await;
    assert!(!Arc::ptr_eq(&first, &second));

    let again = template.receive(&[FetchRequest::new(p0.clone(), 0, 64 * 1024)?]).await?;
    assert_eq!(again.result(&p0).unwrap().messages().len(), 3);
    assert_eq!(cluster.metadata_requests.load(Ordering::SeqCst), 1);

    factory.destroy().await;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_seed_is_skipped() -> Result<()> {
    let cluster = FakeCluster::start().await;

    // 바인딩 후 바로 닫아서 연결이 거부되는 포트를 얻음
    let closed_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let seeds = format!("127.0.0.1:{},{}", closed_port, cluster.seeds());
    let factory = ConnectionFactory::new(Configuration::from_brokers(&seeds)?);

    let leader = factory.get_leader(&Partition::new("orders", 1)).await?;
    assert_eq!(leader, cluster.broker(1));

    let partitions = factory.get_partitions("orders").await?;
    assert_eq!(partitions.len(), 2);

    factory.destroy().await;
    Ok(())
}
