//! Legacy Office conversion through headless LibreOffice.
//!
//! `.doc` and `.ppt` inputs are transcoded to their OOXML equivalents with
//! `soffice --headless --convert-to` and then delegated to the modern
//! extractors. Timeout, non-zero exit, missing output, and empty output are
//! distinct error conditions.

use crate::error::{KreuzbergError, Result};
use crate::types::LibreOfficeConversionResult;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

/// Default timeout for a single conversion (seconds).
pub const DEFAULT_CONVERSION_TIMEOUT: u64 = 300;

/// Check that LibreOffice (soffice) is available in PATH.
pub async fn check_libreoffice_available() -> Result<()> {
    let result = Command::new("soffice").arg("--version").output().await;

    match result {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(KreuzbergError::missing_dependency(
            "LibreOffice (soffice) is installed but not working correctly. Please reinstall LibreOffice.",
        )),
        Err(_) => Err(KreuzbergError::missing_dependency(
            "LibreOffice (soffice) is required for legacy MS Office format support (.doc, .ppt). \
             Install: macOS: 'brew install --cask libreoffice', \
             Linux: 'apt install libreoffice', \
             Windows: 'winget install LibreOffice.LibreOffice'",
        )
        .with_context("install_command", serde_json::json!("apt install libreoffice"))),
    }
}

/// Convert an Office document to a target format using LibreOffice.
pub async fn convert_office_doc(
    input_path: &Path,
    output_dir: &Path,
    target_format: &str,
    timeout_seconds: u64,
) -> Result<Vec<u8>> {
    check_libreoffice_available().await?;

    fs::create_dir_all(output_dir).await?;

    let command = Command::new("soffice")
        .arg("--headless")
        .arg("--convert-to")
        .arg(target_format)
        .arg("--outdir")
        .arg(output_dir)
        .arg(input_path)
        .output();

    let output = match timeout(Duration::from_secs(timeout_seconds), command).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(KreuzbergError::parsing(format!("Failed to execute LibreOffice: {e}"))),
        Err(_) => {
            return Err(KreuzbergError::parsing(format!(
                "LibreOffice conversion timed out after {timeout_seconds} seconds"
            ))
            .with_context("timeout_seconds", serde_json::json!(timeout_seconds)));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);

        // Format/conversion failures are recoverable; anything else is a
        // system fault and must bubble up as I/O.
        let stderr_lower = stderr.to_lowercase();
        let stdout_lower = stdout.to_lowercase();
        let keywords = ["format", "unsupported", "error:", "failed"];

        if keywords
            .iter()
            .any(|k| stderr_lower.contains(k) || stdout_lower.contains(k))
        {
            return Err(KreuzbergError::parsing(format!(
                "LibreOffice conversion failed: {}",
                if !stderr.is_empty() { &stderr } else { &stdout }
            ))
            .with_context("exit_code", serde_json::json!(output.status.code())));
        }

        return Err(KreuzbergError::Io(std::io::Error::other(format!(
            "LibreOffice process failed with return code {}: {}",
            output.status.code().unwrap_or(-1),
            if !stderr.is_empty() { stderr } else { stdout }
        ))));
    }

    let input_stem = input_path
        .file_stem()
        .ok_or_else(|| KreuzbergError::parsing("Invalid input file name"))?;

    let expected_output = output_dir.join(format!("{}.{}", input_stem.to_string_lossy(), target_format));

    let converted_bytes = fs::read(&expected_output).await.map_err(|e| {
        KreuzbergError::parsing(format!(
            "LibreOffice conversion completed but output file not found: {e}"
        ))
        .with_context("expected_output", serde_json::json!(expected_output.display().to_string()))
    })?;

    if converted_bytes.is_empty() {
        return Err(KreuzbergError::parsing("LibreOffice conversion produced empty file"));
    }

    Ok(converted_bytes)
}

async fn convert_bytes(bytes: &[u8], source_format: &str, target_format: &str) -> Result<LibreOfficeConversionResult> {
    let temp_dir = std::env::temp_dir();
    let unique_id = uuid::Uuid::new_v4();
    let input_dir = temp_dir.join(format!("kreuzberg_{source_format}_{unique_id}"));
    let output_dir = temp_dir.join(format!("kreuzberg_{source_format}_{unique_id}_out"));

    fs::create_dir_all(&input_dir).await?;

    let input_path = input_dir.join(format!("input.{source_format}"));
    fs::write(&input_path, bytes).await?;

    let result = convert_office_doc(&input_path, &output_dir, target_format, DEFAULT_CONVERSION_TIMEOUT).await;

    // Cleanup runs on success and failure alike.
    let _ = fs::remove_dir_all(&input_dir).await;
    let _ = fs::remove_dir_all(&output_dir).await;

    let converted_bytes = result?;

    Ok(LibreOfficeConversionResult {
        converted_bytes,
        original_format: source_format.to_string(),
        target_format: target_format.to_string(),
    })
}

/// Convert .doc to .docx.
pub async fn convert_doc_to_docx(doc_bytes: &[u8]) -> Result<LibreOfficeConversionResult> {
    convert_bytes(doc_bytes, "doc", "docx").await
}

/// Convert .ppt to .pptx.
pub async fn convert_ppt_to_pptx(ppt_bytes: &[u8]) -> Result<LibreOfficeConversionResult> {
    convert_bytes(ppt_bytes, "ppt", "pptx").await
}
