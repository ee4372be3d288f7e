//! Plain-text message payload written after `DATA`.

const CRLF: &str = "\r\n";

/// Header block plus body of a single outgoing message.
///
/// Headers are kept as an ordered list so the rendered payload is
/// deterministic: `From`, `To`, `Subject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload {
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl MessagePayload {
    pub fn new(from: &str, to: &str, subject: &str, body: &str) -> Self {
        MessagePayload {
            headers: vec![
                ("From", from.to_string()),
                ("To", to.to_string()),
                ("Subject", subject.to_string()),
            ],
            body: body.to_string(),
        }
    }

    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// Renders `Name: value` lines, a blank line, then the body.
    ///
    /// Every line ends with CRLF, including the last body line. Bare `\n`
    /// line endings in the body are normalized.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 128);
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(CRLF);
        }
        out.push_str(CRLF);

        let body = self.body.strip_suffix('\n').unwrap_or(&self.body);
        for line in body.split('\n') {
            out.push_str(line.strip_suffix('\r').unwrap_or(line));
            out.push_str(CRLF);
        }
        out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.render().into_bytes()
    }
}

/// True when `value` can be placed on a single header line.
pub fn is_single_line(value: &str) -> bool {
    !value.contains(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headers_in_fixed_order() {
        let payload = MessagePayload::new("a@example.com", "b@example.com", "hi", "hello");
        assert_eq!(
            payload.render(),
            "From: a@example.com\r\nTo: b@example.com\r\nSubject: hi\r\n\r\nhello\r\n"
        );
    }

    #[test]
    fn normalizes_body_line_endings() {
        let payload = MessagePayload::new("a@x", "b@x", "s", "one\ntwo\r\nthree\n");
        assert!(payload.render().ends_with("\r\n\r\none\r\ntwo\r\nthree\r\n"));
    }

    #[test]
    fn empty_body_still_terminates() {
        let payload = MessagePayload::new("a@x", "b@x", "", "");
        assert_eq!(payload.render(), "From: a@x\r\nTo: b@x\r\nSubject: \r\n\r\n\r\n");
    }

    #[test]
    fn single_line_check() {
        assert!(is_single_line("plain subject"));
        assert!(!is_single_line("evil\r\nBcc: x@example.com"));
        assert!(!is_single_line("evil\nBcc: x@example.com"));
    }
}
