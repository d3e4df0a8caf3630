//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use parrot_core::error::ProviderError;
use parrot_core::provider::{FragmentStream, Provider, ProviderRequest, StreamFragment};
use tokio::sync::mpsc;

type Fragment = Result<StreamFragment, ProviderError>;

/// One scripted backend response.
pub enum Script {
    /// Send these fragments, then close the stream.
    Fragments(Vec<Fragment>),
    /// Send these fragments and keep the stream open until the receiver is
    /// dropped.
    Hang(Vec<Fragment>),
}

/// A provider that replays scripted responses in order.
///
/// Each call to `stream` takes the next script. Requests are recorded so
/// tests can inspect what the loop sent.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<FragmentStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no more responses"));

        let (fragments, hang) = match script {
            Script::Fragments(fragments) => (fragments, false),
            Script::Hang(fragments) => (fragments, true),
        };

        let (tx, rx) = mpsc::channel(fragments.len() + 1);
        for fragment in fragments {
            tx.try_send(fragment).unwrap();
        }
        if hang {
            tokio::spawn(async move { tx.closed().await });
        }
        Ok(rx)
    }
}

/// A text-only answer.
pub fn text(answer: &str) -> Script {
    Script::Fragments(vec![Ok(StreamFragment::content(answer)), Ok(StreamFragment::Done)])
}

/// One response calling the given tools, each as a single fragment.
pub fn calls(calls: &[(&str, &str, serde_json::Value)]) -> Script {
    let mut fragments = Vec::new();
    for (id, name, arguments) in calls {
        fragments.push(Ok(StreamFragment::tool_call(*id, Some(*name), arguments.to_string())));
        fragments.push(Ok(StreamFragment::finished(*id)));
    }
    fragments.push(Ok(StreamFragment::Done));
    Script::Fragments(fragments)
}
