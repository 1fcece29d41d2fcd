//! Termination behavior of the interactive loop prompt: EOF or a failed
//! read must stop the loop before another sync; Enter runs another pass.
use gsync::cli::prompt_continue;
use std::io::{self, BufRead, Cursor, Read};

/// Drive the loop skeleton the binary uses, counting sync passes.
fn run_loop<R: BufRead>(input: &mut R) -> usize {
    let mut passes = 0;
    loop {
        passes += 1; // one sync pass per iteration
        if !prompt_continue(input) {
            break;
        }
    }
    passes
}

#[test]
fn test_eof_stops_after_single_pass() {
    let mut input = Cursor::new(Vec::<u8>::new());
    assert_eq!(run_loop(&mut input), 1);
}

#[test]
fn test_each_enter_runs_another_pass() {
    let mut input = Cursor::new(b"\n\n".to_vec());
    // Two Enter presses, then EOF: three passes total.
    assert_eq!(run_loop(&mut input), 3);
}

#[test]
fn test_any_line_counts_as_continue() {
    // The prompt only asks for Enter, but any line of input means the user
    // is still there.
    let mut input = Cursor::new(b"yes\n".to_vec());
    assert_eq!(run_loop(&mut input), 2);
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("terminal went away"))
    }
}

impl BufRead for FailingReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Err(io::Error::other("terminal went away"))
    }

    fn consume(&mut self, _amt: usize) {}
}

#[test]
fn test_read_error_stops_loop() {
    let mut input = FailingReader;
    assert_eq!(run_loop(&mut input), 1);
}
