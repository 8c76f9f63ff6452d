use eshim_device::{decode, Locale, Update};
use eshim_frame::{hex_dump, Frame, FrameBuffer};

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_decoded, DecodedFrame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex.join(" "))?;
    let locale = Locale::from(args.language);

    let mut buffer = FrameBuffer::default();
    let frames = buffer.extend(&bytes);
    if frames.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("no device replies found in {} bytes", bytes.len()),
        ));
    }

    let decoded: Vec<DecodedFrame> = frames.iter().map(|frame| describe(frame, locale)).collect();
    print_decoded(&decoded, format);
    Ok(SUCCESS)
}

fn describe(frame: &Frame, locale: Locale) -> DecodedFrame {
    DecodedFrame {
        frame: hex_dump(&frame.to_bytes()),
        address: frame.address,
        register: frame.register().map(|register| register.to_string()),
        value: frame.value(),
        decoded: decode(frame).and_then(|update| summarize(&update, locale)),
    }
}

fn summarize(update: &Update, locale: Locale) -> Option<String> {
    match update {
        Update::Status(report) => {
            let mut parts = report.messages(locale);
            parts.push(format!("coil: {}", report.coil));
            Some(parts.join(", "))
        }
        Update::ChannelFault(_, fault) => Some(fault.message(locale).to_string()),
        _ => None,
    }
}

/// Parse hex text such as `5A A5 40`, `0x5a,0xa5` or `5aa540`.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            DATA_INVALID,
            "hex input has an odd number of digits",
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(DATA_INVALID, format!("invalid hex near offset {i}")))
        })
        .collect()
}
