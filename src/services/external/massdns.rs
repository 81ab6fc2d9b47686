use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::error::ApiError;
use crate::models::ResolvedHost;

#[derive(Debug, Default)]
struct RawRecord {
    ips: Vec<String>,
    cname: Option<String>,
}

/// High-throughput batch resolver backed by the external massdns process.
/// Any spawn or exit failure is surfaced to the caller so the whole
/// candidate set can be retried on the fallback path.
pub struct MassdnsResolver {
    bin: PathBuf,
    resolvers_file: PathBuf,
    batch_size: usize,
}

impl MassdnsResolver {
    pub fn new(bin: PathBuf, settings: &Settings) -> Self {
        Self {
            bin,
            resolvers_file: settings.resolvers_path(),
            batch_size: settings.massdns_batch_size.max(1),
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.bin
    }

    /// Resolve candidates in stdin-fed batches, streaming grouped results
    /// into `out` after each batch completes.
    pub async fn resolve_all(
        &self,
        candidates: &[String],
        out: &mpsc::Sender<ResolvedHost>,
    ) -> Result<(), ApiError> {
        for chunk in candidates.chunks(self.batch_size) {
            let output = self.run_batch(chunk).await?;
            for host in parse_output(&output) {
                if out.send(host).await.is_err() {
                    // Receiver gone: the scan was cancelled.
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn run_batch(&self, chunk: &[String]) -> Result<String, ApiError> {
        let mut child = Command::new(&self.bin)
            .arg("-r")
            .arg(&self.resolvers_file)
            .arg("-o")
            .arg("S")
            .arg("-w")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ApiError::external_service(format!("failed to spawn massdns: {e}"))
            })?;

        let payload: String = chunk
            .iter()
            .map(|name| format!("{name}.\n"))
            .collect();

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApiError::external_service(format!(
                "massdns exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse massdns simple-text output (`name. TYPE value`) into one
/// ResolvedHost per name. Names without any address record are dropped,
/// even when a CNAME is present; a CNAME alone does not make a host.
fn parse_output(output: &str) -> Vec<ResolvedHost> {
    let mut records: BTreeMap<String, RawRecord> = BTreeMap::new();

    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(record_type), Some(value)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };

        let name = name.trim_end_matches('.').to_lowercase();
        let value = value.trim_end_matches('.');
        let record = records.entry(name).or_default();

        match record_type.to_uppercase().as_str() {
            "A" | "AAAA" => {
                let value = value.to_string();
                if !record.ips.contains(&value) {
                    record.ips.push(value);
                }
            }
            "CNAME" => record.cname = Some(value.to_lowercase()),
            _ => {}
        }
    }

    records
        .into_iter()
        .filter(|(_, record)| !record.ips.is_empty())
        .map(|(name, mut record)| {
            record.ips.sort();
            ResolvedHost {
                name,
                ips: record.ips,
                cname: record.cname,
            }
        })
        .collect()
}
