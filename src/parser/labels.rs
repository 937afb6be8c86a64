use super::ast::{Filter, Labels, Size};
use super::command::{Args, Call, ParseResult};

/// `labs(title: "...", x: "...", y: "...", y2: "...")`
pub fn labels(call: Call) -> ParseResult<Labels> {
    let mut args = Args::new(call)?;
    let labels = Labels {
        title: args.text("title")?,
        x: args.text("x")?,
        y: args.text("y")?,
        y2: args.text("y2")?,
    };
    args.finish()?;
    Ok(labels)
}

/// `size(width: N, height: N)`
pub fn size(call: Call) -> ParseResult<Size> {
    let mut args = Args::new(call)?;
    let size = Size {
        width: args.count("width")?,
        height: args.count("height")?,
    };
    args.finish()?;
    Ok(size)
}

/// `filter(column: COL, values: [...])`
pub fn filter(call: Call) -> ParseResult<Filter> {
    let mut args = Args::new(call)?;
    let column = args.required_text("column")?;
    let values = args.list("values")?.unwrap_or_default();
    args.finish()?;
    Ok(Filter { column, values })
}
