//! yantra-ctl - command line client for the YantraIO command channel
//!
//! ```text
//! yantra-ctl [--addr 127.0.0.1:5560] <command>
//!
//!   enqueue NAME [key=value ...]   queue a move
//!   interrupt NAME [key=value ...] cancel current move and run NAME next
//!   status ID | ack ID             request status / acknowledge
//!   cancel | clear                 cancel running move / drop pending
//!   peek | moves | health          queue, vocabulary, daemon health
//! ```
//!
//! Prints the JSON response. Exits non-zero on an error response.

use std::env;
use std::process::ExitCode;
use yantra_io::moves::{ParamValue, Params};
use yantra_io::streaming::Request;
use yantra_io::{CommandClient, Error, Result};

const DEFAULT_ADDR: &str = "127.0.0.1:5560";

fn usage() -> String {
    "usage: yantra-ctl [--addr ADDR] <enqueue NAME [k=v..] | interrupt NAME [k=v..] | \
     status ID | ack ID | cancel | clear | peek | moves | health>"
        .to_string()
}

fn parse_value(raw: &str) -> ParamValue {
    if let Ok(v) = raw.parse::<i64>() {
        ParamValue::Int(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        ParamValue::Float(v)
    } else if let Ok(v) = raw.parse::<bool>() {
        ParamValue::Bool(v)
    } else {
        ParamValue::Text(raw.to_string())
    }
}

fn parse_params(args: &[String]) -> Result<Option<Params>> {
    if args.is_empty() {
        return Ok(None);
    }
    let mut params = Params::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| Error::Other(format!("expected key=value, got '{}'", arg)))?;
        params.insert(key.to_string(), parse_value(value));
    }
    Ok(Some(params))
}

fn parse_id(arg: Option<&String>) -> Result<u64> {
    let raw = arg.ok_or_else(|| Error::Other(usage()))?;
    raw.parse()
        .map_err(|_| Error::Other(format!("invalid request id '{}'", raw)))
}

fn parse_request(args: &[String]) -> Result<Request> {
    let (command, rest) = args.split_first().ok_or_else(|| Error::Other(usage()))?;
    let request = match command.as_str() {
        "enqueue" | "interrupt" => {
            let (name, params) = rest.split_first().ok_or_else(|| Error::Other(usage()))?;
            let move_name = name.clone();
            let params = parse_params(params)?;
            if command == "enqueue" {
                Request::Enqueue { move_name, params }
            } else {
                Request::Interrupt { move_name, params }
            }
        }
        "status" => Request::Status {
            request_id: parse_id(rest.first())?,
        },
        "ack" => Request::Ack {
            request_id: parse_id(rest.first())?,
        },
        "cancel" => Request::CancelCurrent,
        "clear" => Request::ClearQueue,
        "peek" => Request::Peek,
        "moves" => Request::ListMoves,
        "health" => Request::Health,
        other => return Err(Error::Other(format!("unknown command '{}'\n{}", other, usage()))),
    };
    Ok(request)
}

fn run() -> Result<bool> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut addr = DEFAULT_ADDR.to_string();
    if let Some(i) = args.iter().position(|a| a == "--addr" || a == "-a") {
        if i + 1 >= args.len() {
            return Err(Error::Other(usage()));
        }
        addr = args.remove(i + 1);
        args.remove(i);
    }

    let request = parse_request(&args)?;
    let mut client = CommandClient::connect(addr.as_str())?;
    let response = client.send(&request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.is_ok())
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("yantra-ctl: {}", e);
            ExitCode::from(2)
        }
    }
}
