use crate::config::{Sport, SubSport};
use crate::conversion::ConvertedActivity;
use crate::fit::csv::format_value;
use crate::fit::profile::describe;

const PREVIEW_MESSAGES: usize = 25;

fn format_duration(seconds: f64) -> String {
    let rounded = seconds.round().max(0.0) as u64;
    let hours = rounded / 3600;
    let minutes = (rounded % 3600) / 60;
    let seconds = rounded % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else {
        format!("{}m {:02}s", minutes, seconds)
    }
}

fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.0} m", meters)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn options_html<T: std::fmt::Display + PartialEq>(values: &[T], selected: &T) -> String {
    values
        .iter()
        .map(|value| {
            let marker = if value == selected { " selected" } else { "" };
            format!("<option value=\"{value}\"{marker}>{value}</option>")
        })
        .collect()
}

pub fn render_landing_page() -> String {
    include_str!("../templates/landing.html")
        .replace(
            "{{sport_options}}",
            &options_html(&Sport::ALL, &Sport::default()),
        )
        .replace(
            "{{sub_sport_options}}",
            &options_html(&SubSport::ALL, &SubSport::default()),
        )
}

pub fn render_converted_activity(converted: &ConvertedActivity, download_url: &str) -> String {
    let mut body = String::new();

    body.push_str("<section class=\"results-card\">");
    body.push_str(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Activity Overview</p><h2>Converted GPX track</h2></div>",
    );
    body.push_str(&format!(
        "<a class=\"cta\" download=activity.fit href={}>Download FIT file</a>",
        escape(download_url)
    ));
    body.push_str("</div>");

    body.push_str("<div class=\"summary-grid\">");
    for (index, summary) in converted.summaries.iter().enumerate() {
        body.push_str(&format!(
            "<div class=\"summary-card\"><p class=\"label\">Track {} duration</p><p class=\"value\">{}</p></div>",
            index + 1,
            format_duration(summary.elapsed_seconds)
        ));
        body.push_str(&format!(
            "<div class=\"summary-card\"><p class=\"label\">Track {} distance</p><p class=\"value\">{}</p></div>",
            index + 1,
            format_distance(summary.total_distance)
        ));
    }
    if converted.summaries.is_empty() {
        body.push_str("<p>The file contains no tracks.</p>");
    }
    body.push_str("</div>");
    body.push_str("</section>");

    body.push_str("<section class=\"results-card\">");
    body.push_str(&format!(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">FIT messages</p><h2>Showing the first {} of {} messages</h2></div></div>",
        PREVIEW_MESSAGES.min(converted.stream.messages().len()),
        converted.stream.messages().len()
    ));
    body.push_str("<div class=\"table-wrapper\"><table><thead><tr><th>Message</th><th>Fields</th></tr></thead><tbody>");

    for message in converted.stream.messages().iter().take(PREVIEW_MESSAGES) {
        let Ok(described) = describe(message) else {
            continue;
        };
        body.push_str(&format!("<tr><td>{}</td><td>", described.name));
        body.push_str("<ul>");
        for field in &described.fields {
            if let Some(value) = format_value(field) {
                body.push_str(&format!(
                    "<li><strong>{}</strong>: {} {}</li>",
                    field.name, value, field.units
                ));
            }
        }
        body.push_str("</ul></td></tr>");
    }

    body.push_str("</tbody></table></div>");
    body.push_str("</section>");
    body
}
