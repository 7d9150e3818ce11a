//! SubRip (SRT) caption documents and burn-in styling.
//!
//! Subtitles and overlays share one shape ([`TimedSegment`]) and are burned
//! in together, so both are merged into a single document before finalize.
//! The document format is what ffmpeg's `subtitles` filter parses:
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:02,000
//! Hi
//!
//! ```

use std::fmt::Write as _;

use rf_core::config::BurnInStyle;
use rf_core::{Error, Result, SubtitleSource, TimedSegment};

const ARROW: &str = " --> ";

/// Format seconds as `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Parse an `HH:MM:SS,mmm` timestamp into seconds. A `.` separator is
/// accepted too.
pub fn parse_timestamp(s: &str) -> Result<f64> {
    let invalid = || Error::Validation(format!("invalid subtitle timestamp: {s:?}"));
    let s = s.trim();

    let (hms, millis) = s.split_once([',', '.']).ok_or_else(invalid)?;
    let mut parts = hms.split(':');
    let (Some(h), Some(m), Some(sec), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let h: u64 = h.parse().map_err(|_| invalid())?;
    let m: u64 = m.parse().map_err(|_| invalid())?;
    let sec: u64 = sec.parse().map_err(|_| invalid())?;
    let millis: u64 = millis.parse().map_err(|_| invalid())?;
    if m >= 60 || sec >= 60 || millis >= 1000 {
        return Err(invalid());
    }

    let total_ms = h
        .checked_mul(3_600_000)
        .and_then(|ms| ms.checked_add(m * 60_000 + sec * 1000 + millis))
        .ok_or_else(invalid)?;
    Ok(total_ms as f64 / 1000.0)
}

/// Render segments as an SRT document, ordered by start time.
///
/// Indices are 1-based and follow the sorted order. Segments that start at
/// the same time keep their input order. A blank line would terminate the
/// block, so segments are expected to have passed [`TimedSegment::validate`];
/// blank lines in unvalidated text are dropped.
pub fn to_srt(segments: &[TimedSegment]) -> String {
    let mut sorted: Vec<&TimedSegment> = segments.iter().collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut doc = String::new();
    for (i, segment) in sorted.iter().enumerate() {
        let text: Vec<&str> = segment
            .text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        // Writing to a String cannot fail.
        let _ = write!(
            doc,
            "{}\n{}{ARROW}{}\n{}\n\n",
            i + 1,
            format_timestamp(segment.start),
            format_timestamp(segment.end),
            text.join("\n"),
        );
    }
    doc
}

/// Parse an SRT document back into segments.
///
/// Tolerates CRLF line endings, a UTF-8 BOM, missing index lines and extra
/// blank lines between blocks.
pub fn parse_srt(document: &str) -> Result<Vec<TimedSegment>> {
    let normalized = document.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    let mut segments = Vec::new();
    let mut lines = normalized.lines().peekable();

    loop {
        while lines.next_if(|l| l.trim().is_empty()).is_some() {}
        let Some(first) = lines.next() else { break };

        let timing = if first.contains(ARROW.trim()) {
            first
        } else {
            lines.next().ok_or_else(|| {
                Error::Validation(format!("subtitle block {:?} has no timing line", first.trim()))
            })?
        };

        let (start, end) = timing.split_once(ARROW.trim()).ok_or_else(|| {
            Error::Validation(format!("invalid subtitle timing line: {:?}", timing.trim()))
        })?;

        let mut text = Vec::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            text.push(line);
        }

        let segment = TimedSegment::new(
            text.join("\n"),
            parse_timestamp(start)?,
            // Position tags may follow the end time (`--> 00:00:02,000 X1:..`).
            parse_timestamp(end.split_whitespace().next().unwrap_or(""))?,
        );
        segment.validate()?;
        segments.push(segment);
    }

    Ok(segments)
}

/// Combine the request's subtitles and overlays into one validated list,
/// ordered by start time.
pub fn merge_segments(
    subtitles: Option<&SubtitleSource>,
    overlays: &[TimedSegment],
) -> Result<Vec<TimedSegment>> {
    let mut merged = match subtitles {
        None => Vec::new(),
        Some(SubtitleSource::Segments(segments)) => segments.clone(),
        Some(SubtitleSource::Document(doc)) => parse_srt(doc)?,
    };
    merged.extend(overlays.iter().cloned());

    for segment in &merged {
        segment.validate()?;
    }
    merged.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(merged)
}

/// The ASS `force_style` value for `style`.
pub fn force_style(style: &BurnInStyle) -> String {
    format!(
        "FontName={},FontSize={},PrimaryColour={},OutlineColour={},BorderStyle=1,Outline={},Shadow={},Bold={},Alignment=2,MarginV={}",
        style.font_name,
        style.font_size,
        style.primary_colour,
        style.outline_colour,
        style.outline,
        style.shadow,
        if style.bold { 1 } else { 0 },
        style.margin_v,
    )
}

/// The ffmpeg video filter that burns `srt_file` into the picture.
///
/// `srt_file` should be a bare file name resolved against ffmpeg's working
/// directory; filter-graph escaping of absolute paths differs per platform.
pub fn burn_in_filter(srt_file: &str, style: &BurnInStyle) -> String {
    format!("subtitles={srt_file}:force_style='{}'", force_style(style))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_format() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(2.0), "00:00:02,000");
        assert_eq!(format_timestamp(61.5), "00:01:01,500");
        assert_eq!(format_timestamp(3723.0456), "01:02:03,046");
        assert_eq!(format_timestamp(0.0004), "00:00:00,000");
        assert_eq!(format_timestamp(59.9996), "00:01:00,000");
    }

    #[test]
    fn timestamp_parse() {
        assert_eq!(parse_timestamp("00:00:02,000").unwrap(), 2.0);
        assert_eq!(parse_timestamp("01:02:03,046").unwrap(), 3723.046);
        assert_eq!(parse_timestamp("00:00:01.250").unwrap(), 1.25);
        assert!(parse_timestamp("00:61:00,000").is_err());
        assert!(parse_timestamp("2.0").is_err());
        assert!(parse_timestamp("aa:bb:cc,ddd").is_err());
    }

    #[test]
    fn timestamp_parse_rejects_overflowing_hours() {
        let err = parse_timestamp("18446744073709551615:00:00,000").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let doc = "1\n18446744073709551615:00:00,000 --> 18446744073709551615:00:01,000\nHi\n\n";
        assert!(matches!(parse_srt(doc), Err(Error::Validation(_))));
    }

    #[test]
    fn document_is_byte_exact() {
        let doc = to_srt(&[
            TimedSegment::new("Hi", 0.0, 2.0),
            TimedSegment::new("Two\nlines", 2.5, 4.25),
        ]);
        assert_eq!(
            doc,
            "1\n00:00:00,000 --> 00:00:02,000\nHi\n\n\
             2\n00:00:02,500 --> 00:00:04,250\nTwo\nlines\n\n"
        );
    }

    #[test]
    fn document_is_sorted_by_start() {
        let doc = to_srt(&[
            TimedSegment::new("later", 5.0, 6.0),
            TimedSegment::new("first", 1.0, 2.0),
        ]);
        assert!(doc.starts_with("1\n00:00:01,000 --> 00:00:02,000\nfirst\n\n2\n"));
    }

    #[test]
    fn empty_list_is_empty_document() {
        assert_eq!(to_srt(&[]), "");
        assert!(parse_srt("").unwrap().is_empty());
    }

    #[test]
    fn reparse_keeps_text_and_millisecond_times() {
        let original = vec![
            TimedSegment::new("Hello there", 0.1234, 1.9876),
            TimedSegment::new("Second\nline", 2.0, 3.5),
            TimedSegment::new("Ünïcödé ✓", 3600.0, 3601.0005),
        ];
        let parsed = parse_srt(&to_srt(&original)).unwrap();
        assert_eq!(parsed.len(), original.len());
        for (orig, got) in original.iter().zip(&parsed) {
            assert_eq!(got.text, orig.text);
            assert_eq!(got.start, (orig.start * 1000.0).round() / 1000.0);
            assert_eq!(got.end, (orig.end * 1000.0).round() / 1000.0);
        }
    }

    #[test]
    fn every_valid_segment_reparses_identically() {
        let original = vec![
            TimedSegment::new("a\nb", 0.0, 1.0),
            TimedSegment::new("", 1.0, 2.0),
            TimedSegment::new("  indented\nline  ", 2.0, 3.0),
        ];
        for segment in &original {
            segment.validate().unwrap();
        }
        let parsed = parse_srt(&to_srt(&original)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn blank_line_text_is_rejected_by_merge() {
        let overlays = vec![TimedSegment::new("a\n\nb", 0.0, 1.0)];
        assert!(matches!(
            merge_segments(None, &overlays),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn parse_tolerates_crlf_and_missing_index() {
        let doc = "\u{feff}1\r\n00:00:00,000 --> 00:00:01,000\r\nA\r\n\r\n\r\n\
                   00:00:01,000 --> 00:00:02,000 X1:10 X2:20\r\nB\r\n";
        let parsed = parse_srt(doc).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "A");
        assert_eq!(parsed[1].text, "B");
        assert_eq!(parsed[1].end, 2.0);
    }

    #[test]
    fn parse_rejects_inverted_times() {
        let doc = "1\n00:00:05,000 --> 00:00:01,000\nBackwards\n";
        assert!(matches!(parse_srt(doc), Err(Error::Validation(_))));
    }

    #[test]
    fn merge_combines_and_sorts() {
        let subs = SubtitleSource::Document("1\n00:00:03,000 --> 00:00:04,000\nSub\n\n".into());
        let overlays = vec![TimedSegment::new("Overlay", 0.5, 1.0)];
        let merged = merge_segments(Some(&subs), &overlays).unwrap();
        let texts: Vec<&str> = merged.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Overlay", "Sub"]);

        assert!(merge_segments(None, &[]).unwrap().is_empty());
    }

    #[test]
    fn merge_validates_segments() {
        let subs = SubtitleSource::Segments(vec![TimedSegment::new("bad", 2.0, 1.0)]);
        assert!(merge_segments(Some(&subs), &[]).is_err());
    }

    #[test]
    fn burn_in_filter_uses_style() {
        let filter = burn_in_filter("captions_3.srt", &BurnInStyle::default());
        assert_eq!(
            filter,
            "subtitles=captions_3.srt:force_style='FontName=Arial,FontSize=24,\
             PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,BorderStyle=1,\
             Outline=2,Shadow=0,Bold=0,Alignment=2,MarginV=30'"
        );
    }
}
