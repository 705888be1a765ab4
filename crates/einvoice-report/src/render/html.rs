use crate::error::ReportError;
use crate::report::NormalizedReport;

use super::pretty;

/// Minimal HTML page embedding the pretty-printed report
pub fn html_document(report: &NormalizedReport, context_name: &str) -> Result<String, ReportError> {
    let body = pretty(report)?;
    Ok(format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>Validation Report for {}</title>\n\
         </head>\n\
         <body>\n\
         <pre>{}</pre>\n\
         </body>\n\
         </html>\n",
        escape(context_name),
        escape(&body)
    ))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
