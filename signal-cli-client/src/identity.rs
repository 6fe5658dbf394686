//! Parsing for `signal-cli listIdentities` output.

use regex::Regex;
use std::sync::LazyLock;

static UNTRUSTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<phone_number>\+[1-9]\d{10}): UNTRUSTED .* Safety Number: (?P<safety_number>[0-9 ]*)",
    )
    .expect("valid regex")
});

/// An identity that signal-cli has not been told to trust.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UntrustedIdentity {
    /// Phone number of the contact.
    pub phone_number: String,
    /// Safety number digits, space separated as printed by signal-cli.
    pub safety_number: String,
}

/// Pick out the untrusted identities from `listIdentities` lines.
pub fn parse_untrusted_identities<S: AsRef<str>>(lines: &[S]) -> Vec<UntrustedIdentity> {
    lines
        .iter()
        .filter_map(|line| UNTRUSTED.captures(line.as_ref()))
        .map(|caps| UntrustedIdentity {
            phone_number: caps["phone_number"].to_owned(),
            safety_number: caps["safety_number"].trim().to_owned(),
        })
        .collect()
}
