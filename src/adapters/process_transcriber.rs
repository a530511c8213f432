use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::domain::config::TranscriberConfig;
use crate::domain::{DomainError, RawTranscript};
use crate::ports::Transcriber;

/// Transcriber that runs an external program once per file.
///
/// The program is invoked as `<program> <args...> <file> <model>` and must
/// print a JSON transcript somewhere on stdout. Anything before the first
/// `{` or after the last `}` is treated as log noise.
pub struct ProcessTranscriber {
    program: String,
    args: Vec<String>,
    model: String,
    timeout: Duration,
    env: BTreeMap<String, String>,
}

impl ProcessTranscriber {
    pub fn new(config: &TranscriberConfig) -> Self {
        info!(
            program = %config.program,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "ProcessTranscriber created"
        );

        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            model: config.model.clone(),
            timeout: config.timeout(),
            env: config.env.clone(),
        }
    }

    /// Override the wall-clock limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(path)
            .arg(&self.model)
            .env("PYTHONUNBUFFERED", "1")
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Slice of `output` from the first `{` to the last `}` inclusive.
pub fn extract_json_object(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (end > start).then(|| &output[start..=end])
}

/// A broken pipe to the child is the transcriber's failure, not the input file's.
fn capture_failed(err: std::io::Error) -> DomainError {
    DomainError::TranscriberFailed {
        status: "output capture failed".to_string(),
        stderr: err.to_string(),
    }
}

/// Decode the transcript JSON embedded in the transcriber's stdout.
pub fn parse_transcript(stdout: &str) -> Result<RawTranscript, DomainError> {
    let json = extract_json_object(stdout).ok_or_else(|| {
        DomainError::MalformedOutput("No JSON object found in transcriber output".to_string())
    })?;

    serde_json::from_str(json)
        .map_err(|e| DomainError::MalformedOutput(format!("Failed to parse transcriber JSON: {}", e)))
}

#[async_trait]
impl Transcriber for ProcessTranscriber {
    async fn run(&self, path: &Path) -> Result<RawTranscript, DomainError> {
        let start = Instant::now();

        info!(path = ?path, program = %self.program, model = %self.model, "Starting transcription");

        let mut child = self
            .command(path)
            .spawn()
            .map_err(|e| DomainError::Launch(format!("{}: {}", self.program, e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::Launch("stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DomainError::Launch("stderr was not captured".to_string()))?;

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
        let capture = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (status, _, _) = tokio::try_join!(
                child.wait(),
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err),
            )?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        let outcome = tokio::time::timeout(self.timeout, capture).await;

        let (status, out, err) = match outcome {
            Ok(captured) => captured.map_err(capture_failed)?,
            Err(_) => {
                warn!(
                    path = ?path,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Transcription timed out, killing process"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed out transcriber");
                }
                return Err(DomainError::Timeout(self.timeout));
            }
        };

        let processing_time = start.elapsed().as_secs_f64();
        let stdout = String::from_utf8_lossy(&out);
        let stderr = String::from_utf8_lossy(&err);

        info!(
            status = %status,
            processing_time,
            stdout_bytes = out.len(),
            "Transcriber process exited"
        );

        if !status.success() {
            error!(status = %status, stderr = %stderr.trim(), "Transcriber failed");
            return Err(DomainError::TranscriberFailed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let mut transcript = parse_transcript(&stdout).inspect_err(|e| {
            error!(error = %e, "Failed to parse transcriber output");
            debug!(stdout = %stdout, "Transcriber stdout");
        })?;

        transcript.processing_time = processing_time;
        transcript.processed_at = Some(Utc::now());

        Ok(transcript)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_skips_noise() {
        let output = "[MODEL] loading\n{\"text\": \"hi\", \"segments\": []}\n[MAIN] done\n";
        assert_eq!(
            extract_json_object(output),
            Some("{\"text\": \"hi\", \"segments\": []}")
        );
    }

    #[test]
    fn test_extract_json_spans_nested_objects() {
        let output = "noise {\"a\": {\"b\": 1}} trailing";
        assert_eq!(extract_json_object(output), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_extract_json_requires_braces() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("only { open"), None);
        assert_eq!(extract_json_object("} reversed {"), None);
    }

    #[test]
    fn test_capture_failure_is_transcriber_error() {
        let err = capture_failed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        assert_eq!(err.kind(), "transcriber_failed");
        assert!(err.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_parse_transcript_malformed() {
        let err = parse_transcript("{not json}").unwrap_err();
        assert!(matches!(err, DomainError::MalformedOutput(_)));

        let err = parse_transcript("plain text").unwrap_err();
        assert!(matches!(err, DomainError::MalformedOutput(_)));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn shell(script: &str) -> ProcessTranscriber {
            let config = TranscriberConfig {
                program: "/bin/sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
                model: "tiny".to_string(),
                timeout_secs: 30,
                env: BTreeMap::new(),
            };
            ProcessTranscriber::new(&config)
        }

        #[tokio::test]
        async fn test_success_with_log_noise() {
            let transcriber = shell(
                r#"echo "[MODEL] loading $2" >&2
echo "[MAIN] starting"
printf '{"text":"%s","language":"en","segments":[{"start":0.0,"end":1.0,"text":"hi","words":[{"word":" hi.","start":0.0,"end":1.0,"probability":0.7}]}]}\n' "$2"
echo "[MAIN] done""#,
            );

            let raw = transcriber.run(Path::new("/tmp/clip.wav")).await.unwrap();
            assert_eq!(raw.text, "tiny");
            assert_eq!(raw.segments.len(), 1);
            assert!(raw.processed_at.is_some());
            assert!(raw.processing_time >= 0.0);
        }

        #[tokio::test]
        async fn test_file_path_is_passed() {
            let transcriber = shell(r#"printf '{"text":"%s"}' "$1""#);
            let raw = transcriber.run(Path::new("/data/in.mp3")).await.unwrap();
            assert_eq!(raw.text, "/data/in.mp3");
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_stderr() {
            let transcriber = shell("echo 'model exploded' >&2; exit 3");
            let err = transcriber.run(Path::new("/tmp/x.wav")).await.unwrap_err();
            match err {
                DomainError::TranscriberFailed { stderr, .. } => {
                    assert_eq!(stderr, "model exploded")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_no_json_is_malformed() {
            let transcriber = shell("echo 'all done, no output'");
            let err = transcriber.run(Path::new("/tmp/x.wav")).await.unwrap_err();
            assert!(matches!(err, DomainError::MalformedOutput(_)));
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let transcriber = shell("sleep 30").with_timeout(Duration::from_millis(200));
            let started = Instant::now();
            let err = transcriber.run(Path::new("/tmp/x.wav")).await.unwrap_err();

            assert!(matches!(err, DomainError::Timeout(_)));
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        #[tokio::test]
        async fn test_missing_binary_is_launch_error() {
            let config = TranscriberConfig {
                program: "/nonexistent/scribed-transcriber".to_string(),
                ..TranscriberConfig::default()
            };
            let err = ProcessTranscriber::new(&config)
                .run(Path::new("/tmp/x.wav"))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "launch");
        }
    }
}
