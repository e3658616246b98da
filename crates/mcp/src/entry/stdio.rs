#![forbid(unsafe_code)]

use super::framing::{
    TransportMode, detect_mode, parse_request, read_content_length_frame, write_framed,
};
use crate::{SessionLog, ToolServer};

/// Sequential stdio loop: one call in flight at a time. Concurrency is the
/// socket daemon's job; a stdio client that wants pipelining should sequence
/// its own calls.
pub(crate) fn run_stdio(
    server: &mut ToolServer,
    log: &mut SessionLog,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut reader = std::io::BufReader::new(stdin.lock());
    let mut stdout = std::io::stdout().lock();

    // Framing is detected once per process so response framing stays
    // consistent for the whole session.
    let mut mode: Option<TransportMode> = None;

    loop {
        let mut line = String::new();
        let read = std::io::BufRead::read_line(&mut reader, &mut line)?;
        if read == 0 {
            log.note_exit("stdin_eof");
            break;
        }

        let effective = match mode {
            Some(v) => v,
            None => {
                let Some(detected) = detect_mode(&line) else {
                    continue;
                };
                log.note_mode(detected.as_str());
                mode = Some(detected);
                detected
            }
        };

        let body: Vec<u8> = match effective {
            TransportMode::NewlineJson => {
                let raw = line.trim();
                if raw.is_empty() {
                    continue;
                }
                raw.as_bytes().to_vec()
            }
            TransportMode::ContentLength => {
                if line.trim().is_empty() {
                    continue;
                }
                let Some(frame) = read_content_length_frame(&mut reader, Some(line))? else {
                    log.note_exit("stdin_eof");
                    break;
                };
                frame
            }
        };

        let response = match parse_request(&body) {
            Ok(request) => {
                log.note_method(&request.method);
                server.handle(request)
            }
            Err(error_resp) => {
                if let Some(msg) = error_resp
                    .get("error")
                    .and_then(|v| v.get("message"))
                    .and_then(|v| v.as_str())
                {
                    log.note_error(msg);
                }
                Some(error_resp)
            }
        };

        if let Some(resp) = response {
            write_framed(&mut stdout, effective, &resp)?;
        }
    }

    Ok(())
}
