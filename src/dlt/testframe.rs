//! Synthetic frame construction for unit tests.

use super::message::STORAGE_MAGIC;

fn id4(id: &str) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (i, b) in id.bytes().take(4).enumerate() {
        out[i] = b;
    }
    out
}

/// Builds a single well-formed frame byte by byte.
pub struct FrameBuilder {
    ecu: String,
    seconds: u32,
    microseconds: u32,
    app_id: String,
    context_id: String,
    mstp: u8,
    mtin: u8,
    big_endian: bool,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(ecu: &str) -> Self {
        Self {
            ecu: ecu.to_string(),
            seconds: 0,
            microseconds: 0,
            app_id: "APP".to_string(),
            context_id: "CTX".to_string(),
            mstp: 0, // log
            mtin: 1,
            big_endian: false,
            payload: Vec::new(),
        }
    }

    pub fn time(mut self, seconds: u32, microseconds: u32) -> Self {
        self.seconds = seconds;
        self.microseconds = microseconds;
        self
    }

    pub fn ids(mut self, app_id: &str, context_id: &str) -> Self {
        self.app_id = app_id.to_string();
        self.context_id = context_id.to_string();
        self
    }

    pub fn control_response(mut self) -> Self {
        self.mstp = 3;
        self.mtin = 2;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::new();

        // storage header
        frame.extend_from_slice(&STORAGE_MAGIC);
        frame.extend_from_slice(&self.seconds.to_le_bytes());
        frame.extend_from_slice(&(self.microseconds as i32).to_le_bytes());
        frame.extend_from_slice(&id4(&self.ecu));

        // standard header: UEH always, MSBF as requested
        let htyp = 0x01 | if self.big_endian { 0x02 } else { 0x00 };
        let len = (4 + 10 + self.payload.len()) as u16;
        frame.push(htyp);
        frame.push(0); // counter
        frame.extend_from_slice(&len.to_be_bytes());

        // extended header
        let msin = (self.mstp << 1) | (self.mtin << 4);
        frame.push(msin);
        frame.push(0); // argument count
        frame.extend_from_slice(&id4(&self.app_id));
        frame.extend_from_slice(&id4(&self.context_id));

        frame.extend_from_slice(&self.payload);
        frame
    }
}
