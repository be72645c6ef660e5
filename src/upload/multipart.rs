use super::endpoint::Endpoint;

/// Boundary shared by every upload of the process
///
/// Safe to reuse only because uploads never overlap.
pub const DEFAULT_BOUNDARY: &str = "----ESP32Boundary";

/// Form field the server reads the recording from
pub const FIELD_NAME: &str = "audio";

/// Multipart/form-data framing around a single audio file
#[derive(Debug, Clone)]
pub struct MultipartFrame<'a> {
    pub boundary: &'a str,
    pub filename: &'a str,
}

impl<'a> MultipartFrame<'a> {
    pub fn new(boundary: &'a str, filename: &'a str) -> Self {
        Self { boundary, filename }
    }

    /// Opening delimiter and part headers, written before the file bytes
    pub fn preamble(&self) -> String {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
            self.boundary, FIELD_NAME, self.filename
        )
    }

    /// Closing delimiter, written after the file bytes
    pub fn epilogue(&self) -> String {
        format!("\r\n--{}--\r\n", self.boundary)
    }

    pub fn content_length(&self, file_size: u64) -> u64 {
        self.preamble().len() as u64 + file_size + self.epilogue().len() as u64
    }

    /// Request line and headers, terminated by the blank line
    pub fn request_head(&self, endpoint: &Endpoint, file_size: u64) -> String {
        format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Content-Type: multipart/form-data; boundary={}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n",
            endpoint.path,
            endpoint.authority(),
            self.boundary,
            self.content_length(file_size)
        )
    }
}
