pub struct FileSizeUtils;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

impl FileSizeUtils {
    /// Formats a byte count as KB, MB or GB with two decimals.
    ///
    /// Anything below one megabyte is shown in kilobytes, so `0` renders as
    /// `"0.00 KB"`. Negative and non-finite inputs render as the zero value.
    pub fn format_bytes(bytes: f64) -> String {
        Self::format_bytes_with(bytes, 2)
    }

    pub fn format_bytes_with(bytes: f64, decimals: usize) -> String {
        if !bytes.is_finite() || bytes < 0.0 {
            return format!("{:.*} KB", decimals, 0.0);
        }

        if bytes >= GB {
            format!("{:.*} GB", decimals, bytes / GB)
        } else if bytes >= MB {
            format!("{:.*} MB", decimals, bytes / MB)
        } else {
            format!("{:.*} KB", decimals, bytes / KB)
        }
    }

    pub fn format_size(size: u64) -> String {
        Self::format_bytes(size as f64)
    }
}
