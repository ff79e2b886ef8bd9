//! Listing order for folders and panels.
//!
//! Titles are ordered by the episode/chapter number found in them, then by a
//! case-insensitive natural comparison so `p2` sorts before `p10`. Episode
//! numbers have at most three digits; titles carrying a longer number are
//! ordered naturally only.

use crate::model::{Folder, Panel};
use once_cell::sync::Lazy;
use rayon::slice::ParallelSliceMut;
use regex::Regex;
use std::cmp::Ordering;

static EPISODE_TITLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:S\d{1,2}E|第|EP?|Episode|Ch|Chapter|Vol|Volume|#)?\s*(\d{1,3})(?:話|巻|章|節|[._\-\s]|$)",
    )
    .expect("episode title regex is valid")
});

static LONG_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4,}").expect("long number regex is valid"));

/// Extracts the episode number from a title, if it carries one.
pub fn episode_number(title: &str) -> Option<u32> {
    EPISODE_TITLE_REGEX
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Orders two titles the way the library lists them.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    if LONG_NUMBER_REGEX.is_match(a) || LONG_NUMBER_REGEX.is_match(b) {
        return natural_cmp(a, b);
    }

    let num_a = episode_number(a).unwrap_or(0);
    let num_b = episode_number(b).unwrap_or(0);

    num_a.cmp(&num_b).then_with(|| natural_cmp(a, b))
}

/// Case-insensitive comparison treating digit runs as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l, r) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => {
                        let x = x.trim_start_matches('0');
                        let y = y.trim_start_matches('0');
                        x.len().cmp(&y.len()).then_with(|| x.cmp(y))
                    }
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

pub fn sort_panels(panels: &mut [Panel]) {
    panels.par_sort_by(|a, b| compare_titles(&a.title, &b.title));
}

pub fn sort_folders(folders: &mut [Folder]) {
    folders.par_sort_by(|a, b| compare_titles(&a.title, &b.title));
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());

        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}
