//! Segment-wise glob matching for placement rules.
//!
//! Both pattern and path are split on `/` and `\`. Within a segment,
//! `*` matches any run of characters; a segment that is exactly `**`
//! matches zero or more whole segments. All comparison is
//! case-insensitive. This matcher serves rule resolution only — user
//! visible listing goes through the host filesystem's native glob.

/// Match a relative path against a rule pattern.
///
/// An empty pattern matches only the empty path.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pat: Vec<&str> = split_segments(pattern);
    let segs: Vec<&str> = split_segments(path);
    match_segments(&pat, &segs)
}

fn split_segments(s: &str) -> Vec<&str> {
    s.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

fn match_segments(pat: &[&str], path: &[&str]) -> bool {
    let Some((head, rest)) = pat.split_first() else {
        return path.is_empty();
    };

    if *head == "**" {
        // `**` swallows zero or more whole segments; search forward for a
        // suffix the remaining pattern accepts.
        (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
    } else {
        match path.split_first() {
            Some((seg, tail)) => segment_match(head, seg) && match_segments(rest, tail),
            None => false,
        }
    }
}

/// Case-insensitive single-segment match where `*` matches any run of
/// characters within the segment.
fn segment_match(pattern: &str, segment: &str) -> bool {
    let pat: Vec<char> = pattern.chars().flat_map(|c| c.to_lowercase()).collect();
    let seg: Vec<char> = segment.chars().flat_map(|c| c.to_lowercase()).collect();

    // Two-pointer wildcard match with backtracking to the last `*`.
    let (mut p, mut s) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while s < seg.len() {
        if p < pat.len() && (pat[p] == seg[s]) {
            p += 1;
            s += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, s));
            p += 1;
        } else if let Some((star_p, star_s)) = star {
            p = star_p + 1;
            s = star_s + 1;
            star = Some((star_p, star_s + 1));
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}
