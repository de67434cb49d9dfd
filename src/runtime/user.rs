//! User interaction (confirmation prompts).

use anyhow::Result;
use std::io::{self, BufRead, Write};

use super::RealRuntime;

/// Ask `prompt` on `output` and read one answer line from `input`.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        confirm_with_io(prompt, &mut stdin.lock(), &mut stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::confirm_with_io;
    use std::io::Cursor;

    fn answer(text: &str) -> (bool, String) {
        let mut input = Cursor::new(text.as_bytes().to_vec());
        let mut output = Vec::new();
        let ok = confirm_with_io("Uninstall 3 packages?", &mut input, &mut output).unwrap();
        (ok, String::from_utf8(output).unwrap())
    }

    #[test]
    fn accepts_yes() {
        for case in ["y\n", "Y\n", " yes \n"] {
            let (ok, prompt) = answer(case);
            assert!(ok, "{:?} should confirm", case);
            assert_eq!(prompt, "Uninstall 3 packages? [y/N] ");
        }
    }

    #[test]
    fn defaults_to_no() {
        for case in ["\n", "n\n", "nope\n", ""] {
            assert!(!answer(case).0, "{:?} should not confirm", case);
        }
    }
}
