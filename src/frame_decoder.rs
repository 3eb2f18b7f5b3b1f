//! Parses coefficient frames off the sensing link.
//!
//! The interrogator publishes one line per fitted sensor frame:
//!
//! ```text
//! +KCOEF:<ax>,<bx>,<ay>,<by>
//! ```
//!
//! where each field is a decimal float. The transport that delivers the
//! lines (socket, serial bridge, replay file) is not this module's concern.

use nom::{
    bytes::complete::tag,
    combinator::map,
    error::Error,
    number::complete::double,
    sequence::{preceded, tuple},
    Finish, IResult,
};

use std::str::FromStr;

use crate::coefficients::CurvatureModel;

fn parse_kcoef(s: &str) -> IResult<&str, CurvatureModel> {
    map(
        tuple((
            preceded(tag("+KCOEF:"), double),
            preceded(tag(","), double),
            preceded(tag(","), double),
            preceded(tag(","), double),
        )),
        |(ax, bx, ay, by)| CurvatureModel { ax, bx, ay, by },
    )(s)
}

impl FromStr for CurvatureModel {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_kcoef(s).finish() {
            Ok((_remaining, model)) => Ok(model),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}
