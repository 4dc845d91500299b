//! Memory reservation choices offered on push and update.

/// Reservations the controller accepts, smallest first.
pub const MEMORY_CHOICES: [&str; 6] = ["64M", "128M", "256M", "512M", "1G", "2G"];

/// Convert a choice such as `"512M"` or `"1G"` into a quota in MiB.
pub fn memory_choice_to_quota(choice: &str) -> anyhow::Result<u32> {
    let choice = choice.trim();
    let upper = choice.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(mb) = upper.strip_suffix('M') {
        (mb, 1)
    } else if let Some(gb) = upper.strip_suffix('G') {
        (gb, 1024)
    } else {
        (upper.as_str(), 1024)
    };

    let value: u32 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid memory reservation: '{}'", choice))?;
    Ok(value * multiplier)
}

/// Convert a quota in MiB back to its display choice.
pub fn memory_quota_to_choice(quota: u32) -> String {
    if quota < 1024 {
        format!("{quota}M")
    } else {
        format!("{}G", quota / 1024)
    }
}
