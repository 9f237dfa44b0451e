//! Request translator (C5): a pure function mapping an HTTP request to
//! either a single payload frame or a two-frame (header, body) sequence.
//! No I/O; invoked from [`crate::worker`].

/// Minimal, borrowed view of an inbound HTTP request — just the fields the
/// translator needs, independent of whatever HTTP library parsed them.
pub struct RequestView<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub headers: &'a [(String, String)],
    pub remote_host: &'a str,
    pub body: &'a [u8],
}

/// Output frames produced by [`translate`].
pub enum Frames {
    Single(Vec<u8>),
    Pair(Vec<u8>, Vec<u8>),
}

/// Precondition verdict accompanying the produced frames.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    PreconditionFailed,
}

/// Translates `req` into downstream frames per the include-headers policy.
///
/// `PreconditionFailed` fires iff `include_headers` is false and the body
/// is empty; in that case `Frames` still holds a value but callers must
/// discard it and never send, per the publish algorithm's step 2.
pub fn translate(req: &RequestView<'_>, include_headers: bool) -> (Frames, Verdict) {
    if !include_headers && req.body.is_empty() {
        return (Frames::Single(Vec::new()), Verdict::PreconditionFailed);
    }

    if !include_headers {
        return (Frames::Single(req.body.to_vec()), Verdict::Ok);
    }

    let header_frame = header_frame(req);
    (
        Frames::Pair(header_frame, req.body.to_vec()),
        Verdict::Ok,
    )
}

/// Builds the canonical header frame: `<METHOD> <URI> HTTP/1.1\r\n` followed
/// by each header as `<Name>: <Value>\r\n`, in original order. No
/// terminating blank line. `X-Forwarded-For` is rewritten (appended with
/// `, <remote>`) if present, else synthesized as a trailing header.
///
/// Shared by the publish path (via [`translate`]) and the `/reflect` debug
/// route in [`crate::worker`], matching the original daemon's single
/// `print_headers_to_buffer` implementation serving both.
pub fn header_frame(req: &RequestView<'_>) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(req.method);
    out.push(' ');
    out.push_str(req.uri);
    out.push_str(" HTTP/1.1\r\n");

    let mut saw_xff = false;
    for (name, value) in req.headers {
        if name.eq_ignore_ascii_case("x-forwarded-for") {
            saw_xff = true;
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(", ");
            out.push_str(req.remote_host);
            out.push_str("\r\n");
        } else {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
    }

    if !saw_xff {
        out.push_str("X-Forwarded-For: ");
        out.push_str(req.remote_host);
        out.push_str("\r\n");
    }

    out.into_bytes()
}
