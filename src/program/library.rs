//! Built-in example programs.
//!
//! | Name     | What it does                                        |
//! |----------|-----------------------------------------------------|
//! | `square` | drive forward and turn right, four times            |
//! | `zigzag` | alternate right and left turns between short drives |
//! | `dance`  | fast left/right wiggle, then stop                   |
//! | `counter`| announce and drive forward five times, then stop    |

use crate::error::{AppResult, BotError};
use crate::hardware::Direction;
use crate::program::node::{Program, ProgramNode};

const NAMES: [&str; 4] = ["square", "zigzag", "dance", "counter"];

/// Names of all built-in examples, in display order.
pub fn names() -> &'static [&'static str] {
    &NAMES
}

/// Build the example called `name`.
pub fn get(name: &str) -> AppResult<Program> {
    let program = match name.trim().to_ascii_lowercase().as_str() {
        "square" => square(),
        "zigzag" => zigzag(),
        "dance" => dance(),
        "counter" => counter(),
        _ => return Err(BotError::UnknownExample(name.to_string())),
    };
    Ok(program)
}

fn square() -> Program {
    Program::from_sequences(vec![vec![ProgramNode::repeat(
        4,
        vec![
            ProgramNode::moving(Direction::Forward),
            ProgramNode::wait(1.0),
            ProgramNode::moving(Direction::Right),
            ProgramNode::wait(0.5),
        ],
    )]])
}

fn zigzag() -> Program {
    Program::from_sequences(vec![vec![ProgramNode::repeat(
        3,
        vec![
            ProgramNode::moving(Direction::Forward),
            ProgramNode::wait(0.8),
            ProgramNode::moving(Direction::Right),
            ProgramNode::wait(0.5),
            ProgramNode::moving(Direction::Forward),
            ProgramNode::wait(0.8),
            ProgramNode::moving(Direction::Left),
            ProgramNode::wait(0.5),
        ],
    )]])
}

fn dance() -> Program {
    Program::from_sequences(vec![vec![
        ProgramNode::set_speed(900),
        ProgramNode::repeat(
            3,
            vec![
                ProgramNode::moving(Direction::Left),
                ProgramNode::wait(0.3),
                ProgramNode::moving(Direction::Right),
                ProgramNode::wait(0.3),
            ],
        ),
        ProgramNode::stop(),
    ]])
}

fn counter() -> Program {
    Program::from_sequences(vec![vec![
        ProgramNode::repeat(
            5,
            vec![
                ProgramNode::print("Moving..."),
                ProgramNode::moving(Direction::Forward),
                ProgramNode::wait(0.5),
            ],
        ),
        ProgramNode::stop(),
    ]])
}
