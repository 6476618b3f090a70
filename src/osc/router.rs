// Cadenza
// Copyright (C) 2021  Wesley Merkel
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Matches incoming OSC messages by address and argument shape.

use rosc::{OscMessage, OscType};
use std::collections::HashMap;

type Handler<T> = Box<dyn Fn(&mut MatchedArgs) -> Option<T> + Send>;

/// An ordered list of message patterns. The first pattern that matches a message handles it.
pub struct Router<T> {
    matchers: Vec<Matcher<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Router<T> {
        Router {
            matchers: Vec::new(),
        }
    }
}

impl<T> Router<T> {
    /// Adds a pattern for messages sent to `addr`.
    pub fn addr(&mut self, addr: &'static str) -> &mut Matcher<T> {
        self.matchers.push(Matcher::addr(addr));
        let last_index = self.matchers.len() - 1;
        &mut self.matchers[last_index]
    }

    /// Runs the handler of the first pattern matching `message`.
    ///
    /// Patterns without a handler never match.
    pub fn route(&self, message: &OscMessage) -> Option<T> {
        for matcher in self.matchers.iter() {
            if let Some(handler) = matcher.handler.as_ref() {
                if let Some(mut args) = matcher.match_msg(message) {
                    return handler(&mut args);
                }
            }
        }
        None
    }
}

pub struct Matcher<T> {
    addr: &'static str,
    actions: Vec<MatchAction>,
    handler: Option<Handler<T>>,
}

impl<T> Matcher<T> {
    fn addr(addr: &'static str) -> Matcher<T> {
        Matcher {
            addr,
            actions: vec![],
            handler: None,
        }
    }

    pub fn capture(&mut self, name: &'static str) -> &mut Self {
        self.actions.push(MatchAction::Capture(name));
        self
    }

    pub fn capture_optional(&mut self, name: &'static str) -> &mut Self {
        self.actions.push(MatchAction::CaptureOptional(name));
        self
    }

    pub fn handle<F>(&mut self, f: F)
    where
        F: Fn(&mut MatchedArgs) -> Option<T> + Send + 'static,
    {
        self.handler = Some(Box::new(f))
    }

    fn match_msg(&self, message: &OscMessage) -> Option<MatchedArgs> {
        if message.addr != self.addr {
            return None;
        }

        let mut args = message.args.iter().fuse();
        let mut matched_args = MatchedArgs::default();
        for action in self.actions.iter() {
            match (action, args.next()) {
                (MatchAction::Capture(name), Some(arg))
                | (MatchAction::CaptureOptional(name), Some(arg)) => {
                    matched_args.args.insert(name, arg.clone());
                }
                (MatchAction::CaptureOptional(_), None) => {}
                (MatchAction::Capture(_), None) => return None,
            }
        }
        if args.next().is_some() {
            return None;
        }
        Some(matched_args)
    }
}

#[derive(Debug)]
enum MatchAction {
    Capture(&'static str),
    CaptureOptional(&'static str),
}

/// The arguments captured from a matched message.
///
/// Each getter removes the argument it returns, so it can be taken at most once.
#[derive(Debug, Default)]
pub struct MatchedArgs {
    args: HashMap<&'static str, OscType>,
}

impl MatchedArgs {
    pub fn int(&mut self, name: &'static str) -> Option<i32> {
        match self.args.remove(name) {
            Some(OscType::Int(x)) => Some(x),
            _ => None,
        }
    }

    /// Takes a numeric argument as a float. Senders disagree on which numeric type to use, so
    /// ints and doubles are converted.
    pub fn float(&mut self, name: &'static str) -> Option<f32> {
        match self.args.remove(name) {
            Some(OscType::Float(x)) => Some(x),
            Some(OscType::Double(x)) => Some(x as f32),
            Some(OscType::Int(x)) => Some(x as f32),
            _ => None,
        }
    }

    pub fn string(&mut self, name: &'static str) -> Option<String> {
        match self.args.remove(name) {
            Some(OscType::String(x)) => Some(x),
            _ => None,
        }
    }
}
