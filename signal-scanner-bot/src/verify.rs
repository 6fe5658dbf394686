//! Trust every identity signal-cli reports as untrusted.

use signal_cli_client::{SignalCli, SignalCliError, UntrustedIdentity, parse_untrusted_identities};
use tracing::{debug, info};

/// List identities, then trust each untrusted one with its safety number digits.
/// Returns the identities that were trusted.
pub async fn trust_everyone(
    signal_cli: &dyn SignalCli,
) -> Result<Vec<UntrustedIdentity>, SignalCliError> {
    let lines = signal_cli.list_identities().await?;
    let untrusted = parse_untrusted_identities(&lines);
    if untrusted.is_empty() {
        info!("No numbers to verify!");
    }
    for identity in &untrusted {
        debug!("trusting {}", identity.phone_number);
        let digits: String = identity
            .safety_number
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        signal_cli
            .trust_identity(&identity.phone_number, &digits)
            .await?;
    }
    Ok(untrusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signal_cli_client::{MessageTarget, ReceiveStream};
    use std::{sync::Mutex, time::Duration};

    #[derive(Default)]
    struct Identities {
        lines: Vec<String>,
        trusted: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SignalCli for Identities {
        async fn send(&self, _: &str, _: &MessageTarget) -> Result<(), SignalCliError> {
            Ok(())
        }

        async fn receive(&self, _: Duration) -> Result<ReceiveStream, SignalCliError> {
            Err(SignalCliError::Io(std::io::Error::other("not used")))
        }

        async fn list_identities(&self) -> Result<Vec<String>, SignalCliError> {
            Ok(self.lines.clone())
        }

        async fn trust_identity(
            &self,
            number: &str,
            safety_number: &str,
        ) -> Result<(), SignalCliError> {
            self.trusted
                .lock()
                .unwrap()
                .push((number.to_owned(), safety_number.to_owned()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trust_everyone() {
        let cli = Identities {
            lines: vec![
                "+15551234567: UNTRUSTED Added: today Fingerprint: 05 aa Safety Number: 12345 67890".into(),
                "+15557654321: TRUSTED_VERIFIED Added: today Fingerprint: 05 bb Safety Number: 11111".into(),
            ],
            ..Default::default()
        };
        let trusted = trust_everyone(&cli).await.unwrap();
        assert_eq!(trusted.len(), 1);
        assert_eq!(
            *cli.trusted.lock().unwrap(),
            vec![("+15551234567".to_string(), "1234567890".to_string())]
        );
    }
}
