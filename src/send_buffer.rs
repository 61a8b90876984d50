/// Bytes queued for transmission, shifted out one at a time from the event handler.
pub struct SendBuffer<const BUFSIZE: usize> {
    buf: [u8; BUFSIZE],
    pos: usize,
    end: usize,
}

impl<const BUFSIZE: usize> SendBuffer<BUFSIZE> {
    pub const fn new() -> Self {
        Self {
            buf: [0; BUFSIZE],
            pos: 0,
            end: 0,
        }
    }

    /// Replaces the contents. Fails with the capacity if `data` doesn't fit.
    pub fn load(&mut self, data: &[u8]) -> Result<(), usize> {
        if data.len() > BUFSIZE {
            return Err(BUFSIZE);
        }

        self.buf[..data.len()].copy_from_slice(data);
        self.pos = 0;
        self.end = data.len();
        Ok(())
    }

    /// Lets `fill` write straight into the storage. `fill` returns how many bytes it wrote;
    /// `None` leaves the buffer empty.
    pub fn fill_with<F>(&mut self, fill: F) -> bool
    where
        F: FnOnce(&mut [u8]) -> Option<usize>,
    {
        self.reset();

        match fill(&mut self.buf[..]) {
            Some(len) => {
                self.end = len.min(BUFSIZE);
                true
            }
            None => false,
        }
    }

    /// Starts over from the first byte, keeping the contents.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.end = 0;
    }

    pub fn len(&self) -> usize {
        self.end
    }

    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.pos
    }

    pub fn sent(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl<const BUFSIZE: usize> Iterator for SendBuffer<BUFSIZE> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            None
        } else {
            self.pos += 1;
            Some(self.buf[self.pos - 1])
        }
    }
}
