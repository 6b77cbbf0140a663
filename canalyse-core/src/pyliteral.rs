//! Python literal parser
//!
//! `metrix++ view --format=python` writes its result as a single Python
//! literal expression. This module parses such an expression into a
//! [`serde_json::Value`] so it can be deserialized into typed structs.
//!
//! Supported: dicts, lists, tuples, single/double quoted strings (with an
//! optional `u`/`r` prefix), integers, floats, `True`/`False`/`None` and the
//! JSON spellings `true`/`false`/`null`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, digit1, multispace0, none_of, one_of},
    combinator::{all_consuming, cut, map, map_opt, map_res, opt, recognize, value},
    error::{context, ContextError, FromExternalError, ParseError as NomParseError, VerboseError},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use serde_json::{Map, Number, Value};
use std::num::ParseIntError;

/// Parse a complete Python literal
pub fn parse(input: &str) -> Result<Value, String> {
    match all_consuming(delimited(
        multispace0::<_, VerboseError<&str>>,
        literal,
        multispace0,
    ))(input)
    {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(nom::error::convert_error(input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err("Incomplete input".to_string()),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where
    F: FnMut(&'a str) -> IResult<&'a str, O, E>,
    E: NomParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn literal<'a, E>(input: &'a str) -> IResult<&'a str, Value, E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    alt((
        map(dict, Value::Object),
        map(sequence('[', ']'), Value::Array),
        map(sequence('(', ')'), Value::Array),
        map(string, Value::String),
        constant,
        number,
    ))(input)
}

fn constant<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Value, E> {
    alt((
        value(Value::Bool(true), alt((tag("True"), tag("true")))),
        value(Value::Bool(false), alt((tag("False"), tag("false")))),
        value(Value::Null, alt((tag("None"), tag("null")))),
    ))(input)
}

fn number<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Value, E> {
    let (rest, text) = recognize::<_, _, E, _>(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let is_float = text.contains(['.', 'e', 'E']);
    let number = if is_float {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        text.trim_start_matches('+')
            .parse::<i64>()
            .ok()
            .map(Number::from)
            .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
    };

    match number {
        Some(n) => Ok((rest, Value::Number(n))),
        None => Err(nom::Err::Error(E::from_error_kind(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

fn sequence<'a, E>(open: char, close: char) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<Value>, E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    move |input| {
        context(
            "sequence",
            preceded(
                char(open),
                cut(terminated(
                    terminated(
                        separated_list0(char(','), ws(literal)),
                        opt(ws(char(','))),
                    ),
                    preceded(multispace0, char(close)),
                )),
            ),
        )(input)
    }
}

fn dict<'a, E>(input: &'a str) -> IResult<&'a str, Map<String, Value>, E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    context(
        "dict",
        preceded(
            char('{'),
            cut(terminated(
                map(
                    terminated(
                        separated_list0(char(','), ws(dict_entry)),
                        opt(ws(char(','))),
                    ),
                    |entries: Vec<(String, Value)>| entries.into_iter().collect::<Map<String, Value>>(),
                ),
                preceded(multispace0, char('}')),
            )),
        ),
    )(input)
}

fn dict_entry<'a, E>(input: &'a str) -> IResult<&'a str, (String, Value), E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    separated_pair(dict_key, ws(char(':')), literal)(input)
}

/// Dict keys become JSON object keys; non-string keys are stringified
fn dict_key<'a, E>(input: &'a str) -> IResult<&'a str, String, E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    alt((
        string,
        map(alt((constant, number)), |v| match v {
            Value::Null => "None".to_string(),
            other => other.to_string(),
        }),
    ))(input)
}

fn string<'a, E>(input: &'a str) -> IResult<&'a str, String, E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    let (input, prefix) = opt(one_of::<_, _, E>("uUrRbB"))(input)?;
    let raw = matches!(prefix, Some('r') | Some('R'));
    context(
        "string",
        alt((quoted('\'', raw), quoted('"', raw))),
    )(input)
}

fn quoted<'a, E>(quote: char, raw: bool) -> impl FnMut(&'a str) -> IResult<&'a str, String, E>
where
    E: NomParseError<&'a str> + ContextError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    move |input| {
        let body = fold_many0(
            move |i| string_fragment(i, quote, raw),
            String::new,
            |mut acc, fragment: StringFragment<'_>| {
                match fragment {
                    StringFragment::Literal(s) => acc.push_str(s),
                    StringFragment::Escaped(c) => acc.push(c),
                }
                acc
            },
        );
        preceded(char(quote), cut(terminated(body, char(quote))))(input)
    }
}

#[derive(Debug, Clone, Copy)]
enum StringFragment<'a> {
    Literal(&'a str),
    Escaped(char),
}

fn string_fragment<'a, E>(
    input: &'a str,
    quote: char,
    raw: bool,
) -> IResult<&'a str, StringFragment<'a>, E>
where
    E: NomParseError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    if raw {
        return alt((
            map(
                take_while_m_n(1, usize::MAX, |c: char| c != quote && c != '\\'),
                StringFragment::Literal,
            ),
            map(recognize(pair(char('\\'), none_of(""))), StringFragment::Literal),
        ))(input);
    }

    alt((
        map(
            take_while_m_n(1, usize::MAX, |c: char| c != quote && c != '\\'),
            StringFragment::Literal,
        ),
        map(preceded(char('\\'), escape), StringFragment::Escaped),
        // Unknown escapes keep their backslash
        map(recognize(pair(char('\\'), none_of(""))), StringFragment::Literal),
    ))(input)
}

fn escape<'a, E>(input: &'a str) -> IResult<&'a str, char, E>
where
    E: NomParseError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    alt((
        preceded(char('x'), hex_char(2)),
        preceded(char('u'), hex_char(4)),
        preceded(char('U'), hex_char(8)),
        value('\n', char('n')),
        value('\r', char('r')),
        value('\t', char('t')),
        value('\u{08}', char('b')),
        value('\u{0C}', char('f')),
        value('\u{07}', char('a')),
        value('\u{0B}', char('v')),
        one_of("\\'\""),
        octal_char,
    ))(input)
}

fn octal_char<'a, E>(input: &'a str) -> IResult<&'a str, char, E>
where
    E: NomParseError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    map_opt(
        map_res(
            take_while_m_n(1, 3, |c: char| ('0'..='7').contains(&c)),
            |octal: &str| u32::from_str_radix(octal, 8),
        ),
        char::from_u32,
    )(input)
}

fn hex_char<'a, E>(digits: usize) -> impl FnMut(&'a str) -> IResult<&'a str, char, E>
where
    E: NomParseError<&'a str> + FromExternalError<&'a str, ParseIntError>,
{
    map_opt(
        map_res(
            take_while_m_n(digits, digits, |c: char| c.is_ascii_hexdigit()),
            |hex: &str| u32::from_str_radix(hex, 16),
        ),
        char::from_u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse("42").unwrap(), json!(42));
        assert_eq!(parse("-3").unwrap(), json!(-3));
        assert_eq!(parse("1.5").unwrap(), json!(1.5));
        assert_eq!(parse("2.").unwrap(), json!(2.0));
        assert_eq!(parse("1e3").unwrap(), json!(1000.0));
        assert_eq!(parse("True").unwrap(), json!(true));
        assert_eq!(parse("None").unwrap(), json!(null));
        assert_eq!(parse("null").unwrap(), json!(null));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(parse("'abc'").unwrap(), json!("abc"));
        assert_eq!(parse(r#""it's""#).unwrap(), json!("it's"));
        assert_eq!(parse(r"'a\'b\n'").unwrap(), json!("a'b\n"));
        assert_eq!(parse(r"u'\x41é'").unwrap(), json!("Aé"));
        assert_eq!(parse("''").unwrap(), json!(""));
    }

    #[test]
    fn test_unknown_escapes_keep_backslash() {
        assert_eq!(parse(r"'\d+'").unwrap(), json!("\\d+"));
        assert_eq!(parse(r"'C:\src\new'").unwrap(), json!("C:\\src\new"));
        assert_eq!(parse(r"'a\\b'").unwrap(), json!("a\\b"));
        assert_eq!(parse(r"'\101\0'").unwrap(), json!("A\u{0}"));
    }

    #[test]
    fn test_parse_containers() {
        let value = parse("{'a': [1, 2, (3, 4)], \"b\": {'c': None,},}").unwrap();
        assert_eq!(value, json!({"a": [1, 2, [3, 4]], "b": {"c": null}}));
        assert_eq!(parse("[]").unwrap(), json!([]));
        assert_eq!(parse(" { } ").unwrap(), json!({}));
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        assert_eq!(parse("{1: 'x'}").unwrap(), json!({"1": "x"}));
    }

    #[test]
    fn test_accepts_json() {
        let value = parse(r#"{"label": "lines", "index": 3, "flag": false}"#).unwrap();
        assert_eq!(value["index"], json!(3));
        assert_eq!(value["flag"], json!(false));
    }

    #[test]
    fn test_reports_errors() {
        assert!(parse("{'a': }").is_err());
        assert!(parse("[1, 2").is_err());
        assert!(parse("'unterminated").is_err());
        assert!(parse("{'a': 1} trailing").is_err());
        assert!(parse("").is_err());
    }
}
