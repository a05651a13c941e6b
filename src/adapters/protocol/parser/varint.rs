/// Zigzag varints as used inside v2 records.
pub trait PutVarint {
    fn put_varint(&mut self, num: i32);
    fn put_varlong(&mut self, num: i64);
}

impl PutVarint for Vec<u8> {
    fn put_varint(&mut self, num: i32) {
        self.put_varlong(num as i64);
    }

    fn put_varlong(&mut self, num: i64) {
        let mut value = zigzag_encode(num);
        while (value & !0x7F) != 0 {
            self.push(((value & 0x7F) | 0x80) as u8);
            value >>= 7;
        }
        self.push(value as u8);
    }
}

pub fn zigzag_encode(num: i64) -> u64 {
    ((num << 1) ^ (num >> 63)) as u64
}

pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Reads an unsigned LEB128 value. Returns the value and the bytes consumed,
/// or `None` when the input ends early or runs past `max_bytes`.
pub fn decode_unsigned(buf: &[u8], max_bytes: usize) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate().take(max_bytes) {
        result |= ((byte & 0x7f) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
    }

    None
}
