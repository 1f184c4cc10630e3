use crate::Result;
use crate::stats::BatchResponse;
use core::fmt::Write;
use ohno::IntoAppError;

/// Write the whole batch response as pretty-printed JSON.
pub fn generate<W: Write>(response: &BatchResponse, writer: &mut W) -> Result<()> {
    let text = serde_json::to_string_pretty(response).into_app_err("serializing batch response")?;
    writeln!(writer, "{text}")?;
    Ok(())
}
