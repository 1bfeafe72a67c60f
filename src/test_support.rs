//! In-process backends for tests.

use crate::backend::{Completion, CompletionRequest, EditBackend, ModelInfo, Usage};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Prompts received by a fake backend, in call order.
pub(crate) type CallLog = Rc<RefCell<Vec<String>>>;

/// Replays a fixed script of responses.
pub(crate) struct ScriptedBackend {
    script: RefCell<VecDeque<Result<String>>>,
    fallback: Option<Box<dyn Fn() -> Error>>,
    calls: CallLog,
}

impl ScriptedBackend {
    pub(crate) fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            fallback: None,
            calls: CallLog::default(),
        }
    }

    /// A backend that fails every call with the produced error.
    pub(crate) fn failing(make_error: impl Fn() -> Error + 'static) -> Self {
        Self {
            script: RefCell::default(),
            fallback: Some(Box::new(make_error)),
            calls: CallLog::default(),
        }
    }

    pub(crate) fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }
}

impl EditBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }

    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.calls.borrow_mut().push(request.prompt.clone());

        let next = self.script.borrow_mut().pop_front();
        match (next, &self.fallback) {
            (Some(step), _) => step.map(|text| Completion {
                text,
                usage: Usage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            }),
            (None, Some(make_error)) => Err(make_error()),
            (None, None) => Err(Error::malformed("scripted", "script exhausted")),
        }
    }
}

/// Returns the text it was asked to edit, unchanged.
pub(crate) struct EchoBackend {
    calls: CallLog,
}

impl EchoBackend {
    pub(crate) fn new() -> Self {
        Self {
            calls: CallLog::default(),
        }
    }

    pub(crate) fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }
}

impl EditBackend for EchoBackend {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "echo".to_string(),
            description: Some("Returns its input".to_string()),
            size_bytes: None,
        }])
    }

    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.calls.borrow_mut().push(request.prompt.clone());
        Ok(Completion {
            text: original_text(&request.prompt)?.to_string(),
            usage: Usage::default(),
        })
    }
}

/// Body of the `## <header>` section of a rendered prompt.
pub(crate) fn section<'a>(prompt: &'a str, header: &str) -> Option<&'a str> {
    let marker = format!("## {header}\n");
    let start = prompt.find(&marker)? + marker.len();
    let end = prompt[start..]
        .find("\n\n## ")
        .map_or(prompt.len(), |pos| start + pos);
    Some(&prompt[start..end])
}

fn original_text(prompt: &str) -> Result<&str> {
    section(prompt, "ORIGINAL TEXT")
        .ok_or_else(|| Error::malformed("echo", "prompt has no original text"))
}
