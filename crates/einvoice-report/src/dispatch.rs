//! Transport selection for rendered reports

use crate::format::ReportFormat;
use crate::render::RenderedArtifact;
use crate::scratch::ScratchFile;

/// How the rendered bytes reach the caller
#[derive(Debug)]
pub enum Transport {
    /// Body written directly into the response
    Inline(String),
    /// Streamed from scratch storage; the file is released once dropped
    File(ScratchFile),
}

/// Headers and transport for one rendered report
#[derive(Debug)]
pub struct Dispatch {
    pub format: ReportFormat,
    pub content_type: &'static str,
    pub content_disposition: String,
    pub transport: Transport,
}

impl Dispatch {
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            ("Content-Type", self.content_type.to_string()),
            ("Content-Disposition", self.content_disposition.clone()),
        ]
    }
}

pub fn dispatch(artifact: RenderedArtifact) -> Dispatch {
    let format = artifact.format();
    let transport = match artifact {
        RenderedArtifact::Inline { body, .. } => Transport::Inline(body),
        RenderedArtifact::File { file, .. } => Transport::File(file),
    };

    Dispatch {
        format,
        content_type: format.mime_type(),
        content_disposition: format!("attachment; filename={}", format.download_name()),
        transport,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{fixtures::report_with_summary, render};
    use crate::scratch::ScratchDir;

    #[tokio::test]
    async fn test_transport_follows_format() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());
        let report = report_with_summary("ok");

        for format in ReportFormat::ALL {
            let artifact = render(&report, format.extension(), "invoice.xml", &scratch)
                .await
                .unwrap();
            let dispatch = dispatch(artifact);

            assert_eq!(dispatch.content_type, format.mime_type());
            assert_eq!(
                dispatch.content_disposition,
                format!("attachment; filename=report.{}", format.extension())
            );
            match (&dispatch.transport, format.is_file_backed()) {
                (Transport::File(_), true) | (Transport::Inline(_), false) => {}
                _ => panic!("wrong transport for {}", format),
            }
        }
    }

    #[tokio::test]
    async fn test_dropping_dispatch_releases_scratch_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());

        let artifact = render(&report_with_summary("ok"), "docx", "invoice.xml", &scratch)
            .await
            .unwrap();
        let dispatch = dispatch(artifact);
        let Transport::File(file) = &dispatch.transport else {
            panic!("docx should be a file transfer");
        };
        let path = file.path().to_path_buf();
        assert!(path.exists());

        drop(dispatch);
        assert!(!path.exists());
    }
}
