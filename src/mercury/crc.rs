/// CRC-16/MODBUS lookup table (reflected polynomial 0xA001).
const CRC16_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let poly: u16 = 0xA001;
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ poly;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }

    table
}

/// CRC16 of `data` in wire order: the high byte of the result is the first CRC
/// byte on the wire, so `crc16_mercury(data).to_be_bytes()` is what gets appended.
pub fn crc16_mercury(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;

    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }

    crc.swap_bytes()
}

/// Append the CRC of the current contents, high byte first.
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16_mercury(frame);
    frame.extend_from_slice(&crc.to_be_bytes());
}

/// Check the trailing two bytes of `frame` against the CRC of everything before them.
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }

    let data_len = frame.len() - 2;
    let received = u16::from_be_bytes([frame[data_len], frame[data_len + 1]]);
    received == crc16_mercury(&frame[..data_len])
}
