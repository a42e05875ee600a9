//! Decoder for the compact node-range notation reported by the accounting
//! tool, e.g. `c478-[094,102],c479-[032,094]`. A bracket expression combines
//! the literal prefix preceding `[` with each expanded suffix; entries
//! outside brackets are taken verbatim. The prefix is everything since the
//! previous element separator, so the decoder is not tied to one cluster's
//! fixed-width naming convention.

use nom::branch::alt;
use nom::bytes::complete::{take_till, take_till1, take_while1};
use nom::character::complete::char;
use nom::combinator::map;
use nom::multi::separated_list1;
use nom::sequence::{delimited, pair, tuple};

use crate::common::parser::{NomResult, consume_all, p_u32};

/// Range suffixes expand inclusively to zero-padded three-digit tokens.
fn p_suffix_range(input: &str) -> NomResult<Vec<String>> {
    map(tuple((p_u32, char('-'), p_u32)), |(start, _, end)| {
        (start..=end).map(|n| format!("{n:03}")).collect()
    })(input)
}

fn p_suffix_literal(input: &str) -> NomResult<Vec<String>> {
    map(take_while1(|c| c != ',' && c != ']'), |token: &str| {
        vec![token.trim().to_string()]
    })(input)
}

fn p_suffixes(input: &str) -> NomResult<Vec<String>> {
    map(
        separated_list1(char(','), alt((p_suffix_range, p_suffix_literal))),
        |groups| groups.into_iter().flatten().collect(),
    )(input)
}

/// `prefix[suffixes]`, yielding one node name per expanded suffix.
fn p_bracketed(input: &str) -> NomResult<Vec<String>> {
    map(
        pair(
            take_till(|c| c == '[' || c == ','),
            delimited(char('['), p_suffixes, char(']')),
        ),
        |(prefix, suffixes): (&str, Vec<String>)| {
            suffixes
                .into_iter()
                .map(|suffix| format!("{prefix}{suffix}"))
                .collect()
        },
    )(input)
}

fn p_literal(input: &str) -> NomResult<Vec<String>> {
    map(take_till1(|c| c == ',' || c == '['), |name: &str| {
        vec![name.trim().to_string()]
    })(input)
}

fn p_nodelist(input: &str) -> NomResult<Vec<String>> {
    map(
        separated_list1(char(','), alt((p_bracketed, p_literal))),
        |groups| groups.into_iter().flatten().collect(),
    )(input)
}

/// Decodes a compact node list into explicit node names, sorted
/// lexicographically.
pub fn decode(compact: &str) -> anyhow::Result<Vec<String>> {
    let compact = compact.trim();
    if compact.is_empty() {
        return Ok(Vec::new());
    }

    let mut nodes = consume_all(p_nodelist, compact)?;
    nodes.retain(|node| !node.is_empty());
    nodes.sort();
    Ok(nodes)
}
