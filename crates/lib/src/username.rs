//! Display labels for federated Matrix user ids.

/// Pretty label for a federated identifier such as `alice@example.org:matrix.org` or `@bot:example.org`.
///
/// Input lacking either `:` or `@` is treated as an already plain label and returned unchanged.
/// Otherwise the part left of the first `:` is split on `@` and the segment after the first `@`
/// is returned (empty when that segment does not exist). Never fails.
pub fn parse_username_pretty(username: &str) -> &str {
    if !username.contains(':') || !username.contains('@') {
        return username;
    }
    let without_server = username.split(':').next().unwrap_or(username);
    without_server.split('@').nth(1).unwrap_or("")
}
