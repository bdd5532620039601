/// Format a raw byte count into a human-readable string: "12.5 GB"
pub fn fmt_bytes(bytes: u64) -> String {
    const TB: f64 = 1_099_511_627_776.0;
    const GB: f64 = 1_073_741_824.0;
    const MB: f64 = 1_048_576.0;
    const KB: f64 = 1_024.0;
    let b = bytes as f64;
    if b >= TB      { format!("{:.2} TB", b / TB) }
    else if b >= GB { format!("{:.2} GB", b / GB) }
    else if b >= MB { format!("{:.2} MB", b / MB) }
    else if b >= KB { format!("{:.2} KB", b / KB) }
    else            { format!("{} B", bytes) }
}

/// Format a percentage without decimals: "84%"
pub fn fmt_pct(pct: f64) -> String {
    format!("{:.0}%", pct)
}

/// Text progress bar, `width` cells wide: "[#####-----]"
pub fn usage_bar(pct: f64, width: usize) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
