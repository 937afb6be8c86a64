// Command parser for the chart DSL
//
// Every pipeline stage is a call `name(key: value, ...)`. Calls are parsed
// generically here, then checked against the arguments each chart accepts.

use super::ast::{ChartCommand, ChartRequest};
use super::lexer::{bool_literal, identifier, number_literal, string_list, string_literal, ws};
use crate::builder::{
    BarOptions, BoxplotOptions, CountOptions, CumulativeOptions, GroupedOptions, HistogramOptions,
    HistogramSource, LayoutOptions, ProphylaxisOptions, StackedOptions, YesNoOptions,
};
use crate::error::ParseError;
use crate::ir::{Orientation, TextPosition};
use crate::palette::ColorPalette;
use crate::scale::{CategoryOrder, CategorySort};
use nom::{
    branch::alt,
    character::complete::char,
    combinator::map,
    multi::separated_list0,
    sequence::{delimited, separated_pair},
    IResult,
};

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Literal value of one call argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

/// `name(key: value, ...)` before any checking
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<(String, ArgValue)>,
}

fn arg_value(input: &str) -> IResult<&str, ArgValue> {
    alt((
        map(string_list, ArgValue::List),
        map(bool_literal, ArgValue::Bool),
        map(string_literal, ArgValue::Text),
        map(identifier, ArgValue::Text),
        map(number_literal, ArgValue::Number),
    ))(input)
}

fn argument(input: &str) -> IResult<&str, (String, ArgValue)> {
    separated_pair(ws(identifier), char(':'), ws(arg_value))(input)
}

/// Parse one call
/// Format: name() or name(key: value, key: "value", key: [..])
pub fn parse_call(input: &str) -> IResult<&str, Call> {
    let (input, name) = ws(identifier)(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), argument),
        ws(char(')')),
    )(input)?;

    Ok((input, Call { name, args }))
}

/// Typed access to a call's arguments. Each argument is taken at most once;
/// whatever is left over when `finish` runs is unknown to the call.
pub struct Args {
    call: String,
    values: Vec<(String, ArgValue)>,
}

impl Args {
    pub fn new(call: Call) -> ParseResult<Self> {
        for (i, (key, _)) in call.args.iter().enumerate() {
            if call.args[..i].iter().any(|(k, _)| k == key) {
                return Err(ParseError::DuplicateArgument {
                    call: call.name.clone(),
                    arg: key.clone(),
                });
            }
        }
        Ok(Self {
            call: call.name,
            values: call.args,
        })
    }

    pub fn take(&mut self, key: &str) -> Option<ArgValue> {
        let idx = self.values.iter().position(|(k, _)| k == key)?;
        Some(self.values.remove(idx).1)
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> ParseError {
        ParseError::WrongType {
            call: self.call.clone(),
            arg: key.to_string(),
            expected,
        }
    }

    pub fn text(&mut self, key: &str) -> ParseResult<Option<String>> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::Text(s)) => Ok(Some(s)),
            Some(_) => Err(self.wrong_type(key, "a string or identifier")),
        }
    }

    pub fn required_text(&mut self, key: &str) -> ParseResult<String> {
        self.text(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn bool(&mut self, key: &str) -> ParseResult<Option<bool>> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(self.wrong_type(key, "a boolean")),
        }
    }

    pub fn number(&mut self, key: &str) -> ParseResult<Option<f64>> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::Number(n)) => Ok(Some(n)),
            Some(_) => Err(self.wrong_type(key, "a number")),
        }
    }

    /// Non-negative whole number
    pub fn count(&mut self, key: &str) -> ParseResult<Option<u32>> {
        match self.number(key)? {
            None => Ok(None),
            Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(Some(n as u32)),
            Some(_) => Err(self.wrong_type(key, "a whole number")),
        }
    }

    fn missing(&self, key: &str) -> ParseError {
        ParseError::MissingArgument {
            call: self.call.clone(),
            arg: key.to_string(),
        }
    }

    fn conflict(&self, first: &str, second: &str) -> ParseError {
        ParseError::ConflictingArguments {
            call: self.call.clone(),
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    /// Either both arguments or neither
    pub fn text_pair(&mut self, first: &str, second: &str) -> ParseResult<Option<(String, String)>> {
        match (self.text(first)?, self.text(second)?) {
            (Some(a), Some(b)) => Ok(Some((a, b))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(self.missing(second)),
            (None, Some(_)) => Err(self.missing(first)),
        }
    }

    pub fn list(&mut self, key: &str) -> ParseResult<Option<Vec<String>>> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::List(l)) => Ok(Some(l)),
            Some(_) => Err(self.wrong_type(key, "a list of strings")),
        }
    }

    pub fn order(&mut self, key: &str) -> ParseResult<Option<CategoryOrder>> {
        Ok(self.list(key)?.map(CategoryOrder::new))
    }

    pub fn sort(&mut self, key: &str) -> ParseResult<Option<CategorySort>> {
        match self.text(key)?.as_deref() {
            None => Ok(None),
            Some("natural") => Ok(Some(CategorySort::Natural)),
            Some("frequency") => Ok(Some(CategorySort::Frequency)),
            Some(_) => Err(self.wrong_type(key, "natural or frequency")),
        }
    }

    /// Palette by name, or an explicit list of colors
    pub fn palette(&mut self, key: &str) -> ParseResult<Option<ColorPalette>> {
        match self.take(key) {
            None => Ok(None),
            Some(ArgValue::List(colors)) => Ok(Some(ColorPalette::new(colors))),
            Some(ArgValue::Text(name)) => ColorPalette::named(&name)
                .map(Some)
                .ok_or(ParseError::UnknownPalette(name)),
            Some(_) => Err(self.wrong_type(key, "a palette name or a list of colors")),
        }
    }

    pub fn orientation(&mut self, key: &str) -> ParseResult<Option<Orientation>> {
        match self.text(key)?.as_deref() {
            None => Ok(None),
            Some("v" | "vertical") => Ok(Some(Orientation::Vertical)),
            Some("h" | "horizontal") => Ok(Some(Orientation::Horizontal)),
            Some(_) => Err(self.wrong_type(key, "\"v\" or \"h\"")),
        }
    }

    pub fn text_position(&mut self, key: &str) -> ParseResult<Option<TextPosition>> {
        match self.text(key)?.as_deref() {
            None => Ok(None),
            Some("auto") => Ok(Some(TextPosition::Auto)),
            Some("inside") => Ok(Some(TextPosition::Inside)),
            Some("outside") => Ok(Some(TextPosition::Outside)),
            Some(_) => Err(self.wrong_type(key, "auto, inside or outside")),
        }
    }

    /// Arguments every chart accepts: `title` and `rotate`
    pub fn layout(&mut self) -> ParseResult<LayoutOptions> {
        let mut layout = LayoutOptions {
            title: self.text("title")?,
            ..Default::default()
        };
        match self.take("rotate") {
            None | Some(ArgValue::Bool(false)) => {}
            Some(ArgValue::Bool(true)) => layout.rotate_x_labels = true,
            Some(ArgValue::Number(angle)) => {
                layout.rotate_x_labels = true;
                layout.x_rotation_angle = angle.round() as i32;
            }
            Some(_) => return Err(self.wrong_type("rotate", "a boolean or an angle")),
        }
        Ok(layout)
    }

    /// Fail on the first argument nobody asked for
    pub fn finish(self) -> ParseResult<()> {
        match self.values.into_iter().next() {
            None => Ok(()),
            Some((arg, _)) => Err(ParseError::UnknownArgument { call: self.call, arg }),
        }
    }
}

/// Names accepted as the first stage of a pipeline
pub const CHART_COMMANDS: &[&str] = &[
    "bar",
    "count",
    "share",
    "cumulative",
    "stacked",
    "grouped",
    "boxplot",
    "yesno",
    "histogram",
    "prophylaxis",
];

/// `x: COL` for a numeric column, or `start: COL, end: COL` for a duration
fn histogram_source(args: &mut Args) -> ParseResult<HistogramSource> {
    let x = args.text("x")?;
    let dates = (args.text("start")?, args.text("end")?);
    match (x, dates) {
        (Some(x), (None, None)) => Ok(HistogramSource::Column(x)),
        (None, (Some(start), Some(end))) => Ok(HistogramSource::Duration { start, end }),
        (Some(_), (Some(_), _)) => Err(args.conflict("x", "start")),
        (Some(_), (None, Some(_))) => Err(args.conflict("x", "end")),
        (None, (Some(_), None)) => Err(args.missing("end")),
        (None, (None, _)) => Err(args.missing("x")),
    }
}

/// `limit: 0.95` keeps values up to that quantile, `limit: false` keeps all
fn percentile_limit(args: &mut Args, default: Option<f64>) -> ParseResult<Option<f64>> {
    match args.take("limit") {
        None => Ok(default),
        Some(ArgValue::Bool(false)) => Ok(None),
        Some(ArgValue::Number(p)) if (0.0..=1.0).contains(&p) => Ok(Some(p)),
        Some(_) => Err(args.wrong_type("limit", "a quantile between 0 and 1 or false")),
    }
}

/// Turn a generic call into a chart request carrying only the command and
/// its command-level settings (`truncate`, `colors_from`).
pub fn chart_command(call: Call) -> ParseResult<ChartRequest> {
    let name = call.name.clone();
    let mut args = Args::new(call)?;
    let layout = args.layout()?;
    let truncate = match name.as_str() {
        "yesno" | "histogram" | "prophylaxis" => None,
        _ => args.count("truncate")?.map(|n| n as usize),
    };
    let colors_from = match name.as_str() {
        "stacked" | "grouped" | "boxplot" => args.text("colors_from")?,
        _ => None,
    };

    let command = match name.as_str() {
        "bar" => {
            let x = args.required_text("x")?;
            let y = args.required_text("y")?;
            let defaults = BarOptions::default();
            let options = BarOptions {
                layout,
                bar_color: args.text("color")?.unwrap_or(defaults.bar_color),
                text_color: args.text("text_color")?.unwrap_or(defaults.text_color),
                show_values: args.bool("values")?.unwrap_or(defaults.show_values),
                value_format: args.text("format")?.unwrap_or(defaults.value_format),
                orientation: args.orientation("orientation")?.unwrap_or_default(),
                text_position: args.text_position("text_position")?.unwrap_or_default(),
            };
            ChartCommand::Bar { x, y, options }
        }
        "count" | "share" => {
            let x = args.required_text("x")?;
            let defaults = CountOptions::default();
            let options = CountOptions {
                layout,
                bar_color: args.text("color")?.unwrap_or(defaults.bar_color),
                text_color: args.text("text_color")?.unwrap_or(defaults.text_color),
                show_values: args.bool("values")?.unwrap_or(defaults.show_values),
                value_format: args.text("format")?.unwrap_or(defaults.value_format),
                order: args.order("order")?,
                sort: args.sort("sort")?.unwrap_or_default(),
            };
            if name == "count" {
                ChartCommand::Count { x, options }
            } else {
                ChartCommand::Share { x, options }
            }
        }
        "cumulative" => {
            let x = args.required_text("x")?;
            let defaults = CumulativeOptions::default();
            let options = CumulativeOptions {
                layout,
                line_y_axis_title: None,
                bar_color: args.text("color")?.unwrap_or(defaults.bar_color),
                line_color: args.text("line_color")?.unwrap_or(defaults.line_color),
                text_color: args.text("text_color")?.unwrap_or(defaults.text_color),
                show_bar_values: args.bool("values")?.unwrap_or(defaults.show_bar_values),
                show_cumulative_values: args
                    .bool("cumulative_values")?
                    .unwrap_or(defaults.show_cumulative_values),
                order: args.order("order")?,
                sort: args.sort("sort")?.unwrap_or_default(),
            };
            ChartCommand::Cumulative { x, options }
        }
        "stacked" => {
            let x = args.required_text("x")?;
            let stack = args.required_text("stack")?;
            let normalize = args.bool("normalize")?.unwrap_or(false);
            let defaults = StackedOptions::default();
            let options = StackedOptions {
                layout,
                x_order: args.order("order")?,
                x_sort: args.sort("sort")?.unwrap_or_default(),
                stack_order: args.order("stack_order")?,
                palette: args.palette("palette")?.unwrap_or(defaults.palette),
                color_map: None,
                show_values: args.bool("values")?.unwrap_or(defaults.show_values),
                value_format: args.text("format")?.unwrap_or(defaults.value_format),
                keep_empty: args.bool("keep_empty")?.unwrap_or(defaults.keep_empty),
            };
            ChartCommand::Stacked {
                x,
                stack,
                normalize,
                options,
            }
        }
        "grouped" => {
            let x = args.required_text("x")?;
            let group = args.required_text("group")?;
            let defaults = GroupedOptions::default();
            let options = GroupedOptions {
                layout,
                line_y_axis_title: None,
                x_order: args.order("order")?,
                palette: args.palette("palette")?.unwrap_or(defaults.palette),
                color_map: None,
                line_color: args.text("line_color")?.unwrap_or(defaults.line_color),
                show_values: args.bool("values")?.unwrap_or(defaults.show_values),
                show_cumulative_values: args
                    .bool("cumulative_values")?
                    .unwrap_or(defaults.show_cumulative_values),
            };
            ChartCommand::Grouped { x, group, options }
        }
        "boxplot" => {
            let x = args.required_text("x")?;
            let y = args.required_text("y")?;
            let defaults = BoxplotOptions::default();
            let options = BoxplotOptions {
                layout,
                auto_colors: args.bool("auto_colors")?.unwrap_or(defaults.auto_colors),
                palette: args.palette("palette")?,
                color_map: None,
                color_column: args.text("color")?,
                show_points: args.bool("points")?.unwrap_or(defaults.show_points),
                point_size: args.number("point_size")?.unwrap_or(defaults.point_size),
                force_zero_start: args.bool("zero")?.unwrap_or(defaults.force_zero_start),
                x_order: args.order("order")?,
            };
            ChartCommand::Boxplot { x, y, options }
        }
        "yesno" => {
            let columns = args.list("columns")?.ok_or_else(|| args.missing("columns"))?;
            let defaults = YesNoOptions::default();
            let options = YesNoOptions {
                layout,
                yes_label: args.text("yes")?.unwrap_or(defaults.yes_label),
                no_label: args.text("no")?.unwrap_or(defaults.no_label),
                yes_tokens: args.list("yes_tokens")?.unwrap_or(defaults.yes_tokens),
                yes_color: args.text("yes_color")?.unwrap_or(defaults.yes_color),
                no_color: args.text("no_color")?.unwrap_or(defaults.no_color),
                show_values: args.bool("values")?.unwrap_or(defaults.show_values),
                value_format: args.text("format")?.unwrap_or(defaults.value_format),
                missing_as_no: args.bool("missing_as_no")?.unwrap_or(defaults.missing_as_no),
            };
            ChartCommand::YesNo { columns, options }
        }
        "histogram" => {
            let source = histogram_source(&mut args)?;
            let by = args.text("by")?;
            let filter = args.text_pair("only", "equals")?;
            let defaults = HistogramOptions::default();
            let options = HistogramOptions {
                layout,
                bin_size: args.number("bin")?.unwrap_or(defaults.bin_size),
                percentile_limit: percentile_limit(&mut args, defaults.percentile_limit)?,
                filter_column: filter.as_ref().map(|f| f.0.clone()),
                filter_value: filter.map(|f| f.1),
                bar_color: args.text("color")?.unwrap_or(defaults.bar_color),
                density_color: args.text("density_color")?.unwrap_or(defaults.density_color),
                show_density: args.bool("density")?.unwrap_or(defaults.show_density),
                strata: args.order("strata")?,
                max_strata: args
                    .count("max_strata")?
                    .map(|n| n as usize)
                    .unwrap_or(defaults.max_strata),
                opacity: args.number("opacity")?.unwrap_or(defaults.opacity),
                palette: args.palette("palette")?.unwrap_or(defaults.palette),
            };
            ChartCommand::Histogram { source, by, options }
        }
        "prophylaxis" => {
            let columns = args.list("columns")?.unwrap_or_default();
            let defaults = ProphylaxisOptions::default();
            let options = ProphylaxisOptions {
                layout,
                yes_value: args.text("yes")?.unwrap_or(defaults.yes_value),
                no_value: args.text("no")?.unwrap_or(defaults.no_value),
                excluded_prefixes: args.list("exclude")?.unwrap_or(defaults.excluded_prefixes),
                bar_color: args.text("color")?.unwrap_or(defaults.bar_color),
                text_color: args.text("text_color")?.unwrap_or(defaults.text_color),
                show_values: args.bool("values")?.unwrap_or(defaults.show_values),
                value_format: args.text("format")?.unwrap_or(defaults.value_format),
                sort_descending: args.bool("descending")?.unwrap_or(defaults.sort_descending),
            };
            ChartCommand::Prophylaxis { columns, options }
        }
        _ => return Err(ParseError::UnknownCommand(name)),
    };

    args.finish()?;
    let mut request = ChartRequest::new(command);
    request.truncate = truncate;
    request.colors_from = colors_from;
    Ok(request)
}
