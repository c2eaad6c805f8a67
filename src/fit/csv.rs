use crate::conversion::sequence::ActivityStream;
use crate::conversion::types::ConvertError;
use crate::fit::profile::{FieldValue, FitMessage, describe};
use std::collections::HashMap;

/// Render the stream as a FitCSVTool-style table.
///
/// A `Definition` row precedes the first use of every local message number
/// (or a change of its layout); each message then gets a `Data` row with
/// physical values and units. Invalid values are left out of data rows.
pub fn to_csv(stream: &ActivityStream) -> Result<String, ConvertError> {
    let messages = stream
        .messages()
        .iter()
        .map(describe)
        .collect::<Result<Vec<FitMessage>, _>>()?;

    let columns = messages
        .iter()
        .map(|message| message.fields.len())
        .max()
        .unwrap_or(0);

    let mut out = String::from("Type,Local Number,Message");
    for index in 1..=columns {
        out.push_str(&format!(",Field {index},Value {index},Units {index}"));
    }
    out.push('\n');

    let mut definitions: HashMap<u8, Vec<(u8, u8, u8)>> = HashMap::new();
    for message in &messages {
        let layout = message.layout();
        if definitions.get(&message.local) != Some(&layout) {
            push_row(
                &mut out,
                "Definition",
                message,
                message.fields.iter().map(|field| (field.name, "1".to_string(), "")),
            );
            definitions.insert(message.local, layout);
        }

        push_row(
            &mut out,
            "Data",
            message,
            message.fields.iter().filter_map(|field| {
                format_value(field).map(|value| (field.name, value, field.units))
            }),
        );
    }

    Ok(out)
}

fn push_row<'a>(
    out: &mut String,
    row_type: &str,
    message: &FitMessage,
    cells: impl Iterator<Item = (&'a str, String, &'a str)>,
) {
    out.push_str(&format!("{row_type},{},{}", message.local, message.name));
    for (name, value, units) in cells {
        out.push_str(&format!(",{name},\"{value}\",{units}"));
    }
    out.push('\n');
}

pub(crate) fn format_value(field: &FieldValue) -> Option<String> {
    let raw = field.raw?;
    if field.scale == 1.0 && field.offset == 0.0 {
        return Some(raw.to_string());
    }
    field.physical().map(|value| {
        let text = format!("{value:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    })
}
