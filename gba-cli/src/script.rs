use anyhow::{bail, Context, Result};
use gba_hal::Keys;

/// One line of a keypad script: a raw `KEYINPUT` value held for `ticks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub raw: u16,
    pub ticks: usize,
}

/// Parse a keypad script into steps.
///
/// Each non-empty line is a sample followed by an optional `xN` repeat
/// count. A sample is either a raw, active-low register value in hex
/// (`03FE`, `0x03FE`) or `+`-joined button names (`A+UP`); `-` means no
/// buttons. `#` starts a comment.
pub fn parse_script(input: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for (line_num, line) in input.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let sample = fields.next().unwrap_or("");
        let raw = parse_sample(sample).with_context(|| format!("line {}", line_num + 1))?;

        let ticks = match fields.next() {
            None => 1,
            Some(count) => parse_count(count).with_context(|| format!("line {}", line_num + 1))?,
        };

        if let Some(extra) = fields.next() {
            bail!("line {}: unexpected '{}'", line_num + 1, extra);
        }

        steps.push(Step { raw, ticks });
    }

    Ok(steps)
}

/// Expand steps into one raw value per tick.
pub fn expand(steps: &[Step]) -> Vec<u16> {
    steps
        .iter()
        .flat_map(|step| std::iter::repeat(step.raw).take(step.ticks))
        .collect()
}

fn parse_sample(sample: &str) -> Result<u16> {
    if sample == "-" {
        return Ok(Keys::empty().to_raw());
    }

    if let Ok(raw) = parse_hex(sample) {
        return Ok(raw);
    }

    let mut keys = Keys::empty();
    for name in sample.split('+') {
        let key = Keys::from_name(&name.to_ascii_uppercase())
            .with_context(|| format!("'{}' is neither a hex value nor a button", name))?;
        keys |= key;
    }
    Ok(keys.to_raw())
}

/// Hex needs a `0x` prefix or exactly four digits, so `A` and `B` stay
/// button names.
fn parse_hex(text: &str) -> Result<u16> {
    let digits = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) if !digits.is_empty() && digits.len() <= 4 => digits,
        Some(_) => bail!("expected 1 to 4 hex digits after 0x"),
        None if text.len() == 4 => text,
        None => bail!("expected 4 hex digits"),
    };
    u16::from_str_radix(digits, 16).with_context(|| format!("invalid hex '{}'", text))
}

fn parse_count(text: &str) -> Result<usize> {
    let Some(digits) = text.strip_prefix('x') else {
        bail!("repeat count must look like 'x3', got '{}'", text);
    };
    let count: usize = digits
        .parse()
        .with_context(|| format!("invalid repeat count '{}'", text))?;
    if count == 0 {
        bail!("repeat count must be at least 1");
    }
    Ok(count)
}
