// Note names for pitch fields (12-tone equal temperament, A4 = 0 cents)

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitones from C up to A within an octave
const A_OFFSET: i64 = 9;

/// Format cents as the nearest note name plus the deviation in cents
pub fn format_note(cents: f64) -> String {
    if !cents.is_finite() {
        return "???".to_string();
    }

    let semitones = (cents / 100.0).round() as i64;
    let from_c = semitones + A_OFFSET;
    let name = NOTE_NAMES[from_c.rem_euclid(12) as usize];
    let octave = 4 + from_c.div_euclid(12);
    let deviation = (cents - semitones as f64 * 100.0).round() as i64;

    if deviation == 0 {
        format!("{}{}", name, octave)
    } else {
        format!("{}{}{:+}", name, octave, deviation)
    }
}

/// Parse a note name such as `C5`, `Bb3` or `A4+12` to cents
///
/// Returns `None` for anything that does not start with a note letter.
pub fn parse_note(text: &str) -> Option<f64> {
    let text = text.trim();
    let mut chars = text.chars().peekable();

    let letter = chars.next()?.to_ascii_uppercase();
    let base: i64 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut accidental = 0;
    match chars.peek() {
        Some('#') => {
            accidental = 1;
            chars.next();
        }
        Some('b') => {
            accidental = -1;
            chars.next();
        }
        _ => {}
    }

    let rest: String = chars.collect();

    // The octave may be negative, the deviation starts at the next sign
    let (octave_str, deviation_str) = match rest
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
    {
        Some((i, _)) => rest.split_at(i),
        None => (rest.as_str(), ""),
    };

    let octave: i64 = octave_str.parse().ok()?;
    let deviation: f64 = if deviation_str.is_empty() {
        0.0
    } else {
        deviation_str.parse().ok()?
    };

    let semitones = (octave - 4) * 12 + base + accidental - A_OFFSET;
    Some(semitones as f64 * 100.0 + deviation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_reference_pitches() {
        assert_eq!(format_note(0.0), "A4");
        assert_eq!(format_note(300.0), "C5");
        assert_eq!(format_note(-900.0), "C4");
        assert_eq!(format_note(-5700.0), "C0");
        assert_eq!(format_note(-5800.0), "B-1");
    }

    #[test]
    fn test_format_deviation() {
        assert_eq!(format_note(12.0), "A4+12");
        assert_eq!(format_note(-30.0), "A4-30");
        assert_eq!(format_note(170.0), "B4-30");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_note("A4"), Some(0.0));
        assert_eq!(parse_note("C5"), Some(300.0));
        assert_eq!(parse_note("c#5"), Some(400.0));
        assert_eq!(parse_note("Bb3"), Some(-1100.0));
        assert_eq!(parse_note("A4+12"), Some(12.0));
        assert_eq!(parse_note("B-1"), Some(-5800.0));
        assert_eq!(parse_note("B-1-30"), Some(-5830.0));
        assert_eq!(parse_note("300"), None);
        assert_eq!(parse_note("-1200"), None);
        assert_eq!(parse_note("H4"), None);
    }

    #[test]
    fn test_parse_inverts_format() {
        for cents in [-2400.0, -50.0, 0.0, 123.0, 1900.0] {
            assert_eq!(parse_note(&format_note(cents)), Some(cents));
        }
    }
}
