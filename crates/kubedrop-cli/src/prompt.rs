//! Interactive confirmation

use std::io::{self, BufRead, Write};

/// Ask `message` until the answer is yes/y or no/n
///
/// End of input counts as no.
pub fn confirm<R: BufRead, W: Write>(
    message: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    loop {
        write!(output, "{} ", message)?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }

        match answer.trim().to_lowercase().as_str() {
            "yes" | "y" => return Ok(true),
            "no" | "n" => return Ok(false),
            _ => writeln!(output, "Please type 'yes' or 'no'.")?,
        }
    }
}

/// [`confirm`] on the terminal
pub fn confirm_on_terminal(message: &str) -> io::Result<bool> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    confirm(message, &mut stdin.lock(), &mut stdout)
}
