// Pipeline parser for the chart DSL

use super::ast::ChartRequest;
use super::command::{chart_command, parse_call, Call, ParseResult, CHART_COMMANDS};
use super::labels::{filter, labels, size};
use super::lexer::ws;
use crate::error::ParseError;
use nom::{
    character::complete::char,
    combinator::eof,
    multi::separated_list1,
    sequence::terminated,
    IResult,
};

fn parse_calls(input: &str) -> IResult<&str, Vec<Call>> {
    terminated(separated_list1(ws(char('|')), parse_call), ws(eof))(input)
}

/// Parse a complete chart request
/// Format: command(...) | filter(...) | labs(...) | size(...)
pub fn parse_chart_request(input: &str) -> ParseResult<ChartRequest> {
    if input.trim().is_empty() {
        return Err(ParseError::NoCommand);
    }

    let calls = match parse_calls(input) {
        Ok((_, calls)) => calls,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::Syntax(snippet(e.input)))
        }
        Err(nom::Err::Incomplete(_)) => return Err(ParseError::Syntax(snippet(input))),
    };

    let mut request: Option<ChartRequest> = None;
    let mut request_labels = None;
    let mut request_size = None;
    let mut filters = Vec::new();

    for call in calls {
        match call.name.as_str() {
            "labs" => request_labels = Some(labels(call)?),
            "size" => request_size = Some(size(call)?),
            "filter" => filters.push(filter(call)?),
            name if request.is_some() && CHART_COMMANDS.contains(&name) => {
                return Err(ParseError::MultipleCommands(call.name))
            }
            _ if request.is_some() => return Err(ParseError::UnknownCommand(call.name)),
            _ => request = Some(chart_command(call)?),
        }
    }

    let mut request = request.ok_or(ParseError::NoCommand)?;
    request.labels = request_labels;
    request.size = request_size;
    request.filters = filters;
    Ok(request)
}

/// First few characters of the unparsed input, for error messages
fn snippet(rest: &str) -> String {
    let rest = rest.trim();
    if rest.is_empty() {
        return "end of input".to_string();
    }
    rest.chars().take(20).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{ChartCommand, Size};

    #[test]
    fn test_parse_command_only() {
        let request = parse_chart_request("cumulative(x: Year)").unwrap();
        assert!(matches!(request.command, ChartCommand::Cumulative { .. }));
        assert!(request.labels.is_none());
        assert!(request.size.is_none());
        assert_eq!(request.truncate, None);
    }

    #[test]
    fn test_parse_full_pipeline() {
        let request = parse_chart_request(
            r#"stacked(x: "Age Group", stack: "Main Diagnosis", normalize: true) | labs(title: "Diagnostics") | size(width: 1000, height: 400)"#,
        )
        .unwrap();
        match &request.command {
            ChartCommand::Stacked { x, stack, normalize, .. } => {
                assert_eq!(x, "Age Group");
                assert_eq!(stack, "Main Diagnosis");
                assert!(normalize);
            }
            other => panic!("Expected Stacked command, got {:?}", other),
        }
        assert_eq!(request.labels.unwrap().title, Some("Diagnostics".to_string()));
        assert_eq!(
            request.size,
            Some(Size {
                width: Some(1000),
                height: Some(400)
            })
        );
    }

    #[test]
    fn test_labs_may_come_first() {
        let request = parse_chart_request(r#"labs(x: "Year") | count(x: Year)"#).unwrap();
        assert!(matches!(request.command, ChartCommand::Count { .. }));
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_chart_request("   ").unwrap_err(), ParseError::NoCommand);
        assert_eq!(
            parse_chart_request(r#"labs(title: "t")"#).unwrap_err(),
            ParseError::NoCommand
        );
    }

    #[test]
    fn test_parse_trailing_pipe() {
        assert!(matches!(
            parse_chart_request("count(x: Year) |").unwrap_err(),
            ParseError::Syntax(_)
        ));
    }

    #[test]
    fn test_parse_trailing_garbage() {
        assert!(matches!(
            parse_chart_request("count(x: Year) extra").unwrap_err(),
            ParseError::Syntax(_)
        ));
    }

    #[test]
    fn test_parse_filter_stages() {
        let request = parse_chart_request(
            r#"filter(column: Year, values: [2021, 2022]) | count(x: Sex) | filter(column: Sex, values: ["F"])"#,
        )
        .unwrap();
        assert_eq!(request.filters.len(), 2);
        assert_eq!(request.filters[0].column, "Year");
        assert_eq!(request.filters[0].values, vec!["2021", "2022"]);
        assert_eq!(request.filters[1].values, vec!["F"]);
        assert!(matches!(request.command, ChartCommand::Count { .. }));
    }

    #[test]
    fn test_parse_two_commands() {
        assert_eq!(
            parse_chart_request("count(x: Year) | share(x: Sex)").unwrap_err(),
            ParseError::MultipleCommands("share".to_string())
        );
        assert_eq!(
            parse_chart_request("count(x: Year) | theme()").unwrap_err(),
            ParseError::UnknownCommand("theme".to_string())
        );
    }
}
