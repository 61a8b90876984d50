/// Bytes received from the bus, up to a per-exchange limit.
pub struct ReceiveBuffer<const BUFSIZE: usize> {
    buf: [u8; BUFSIZE],
    size: usize,
    limit: usize,
}

impl<const BUFSIZE: usize> ReceiveBuffer<BUFSIZE> {
    pub const fn new() -> Self {
        Self {
            buf: [0; BUFSIZE],
            size: 0,
            limit: 0,
        }
    }

    /// Empties the buffer and accepts at most `limit` bytes from now on.
    pub fn accept(&mut self, limit: usize) {
        self.size = 0;
        self.limit = limit.min(BUFSIZE);
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), ()> {
        if self.size == self.limit {
            Err(())
        } else {
            self.buf[self.size] = byte;
            self.size += 1;
            Ok(())
        }
    }

    pub fn get_limit(&self) -> usize {
        self.limit
    }

    /// Bytes still accepted.
    pub fn remaining(&self) -> usize {
        self.limit - self.size
    }

    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.size]
    }

    /// Copies the received bytes out. Fails with the number of bytes held if `buf` is short.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, usize> {
        if buf.len() < self.size {
            Err(self.size)
        } else {
            buf[..self.size].copy_from_slice(&self.buf[..self.size]);
            Ok(self.size)
        }
    }

    pub fn reset(&mut self) {
        self.size = 0;
        self.limit = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_limit() {
        let mut rb = ReceiveBuffer::<8>::new();
        rb.accept(2);
        assert_eq!(rb.write_byte(1), Ok(()));
        assert_eq!(rb.remaining(), 1);
        assert_eq!(rb.write_byte(2), Ok(()));
        assert_eq!(rb.write_byte(3), Err(()));
        assert_eq!(rb.as_slice(), &[1, 2]);
    }

    #[test]
    fn limit_is_clamped_to_capacity() {
        let mut rb = ReceiveBuffer::<2>::new();
        rb.accept(100);
        assert_eq!(rb.get_limit(), 2);
    }

    #[test]
    fn read_reports_required_length() {
        let mut rb = ReceiveBuffer::<4>::new();
        rb.accept(4);
        rb.write_byte(0x11).unwrap();
        rb.write_byte(0x22).unwrap();

        let mut short = [0u8; 1];
        assert_eq!(rb.read(&mut short), Err(2));

        let mut out = [0u8; 4];
        assert_eq!(rb.read(&mut out), Ok(2));
        assert_eq!(&out[..2], &[0x11, 0x22]);
    }
}
