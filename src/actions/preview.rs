use crate::git::parser::CommitRecord;
use serde::Serialize;

/// How the host should preview an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Previewer {
    /// Run a command in a terminal window
    Terminal { cmds: Vec<String> },
    /// Show fixed text
    Text { contents: Vec<String> },
}

pub fn preview(record: &CommitRecord, no_pager: bool) -> Previewer {
    match record {
        CommitRecord::Commit(commit) => {
            let mut cmds = vec!["git".to_string()];
            if no_pager {
                cmds.push("--no-pager".to_string());
            }
            cmds.extend([
                "-C".to_string(),
                commit.cwd.display().to_string(),
                "show".to_string(),
                commit.hash.clone(),
            ]);
            Previewer::Terminal { cmds }
        }
        CommitRecord::Graph { .. } => Previewer::Text {
            contents: vec!["selected line has no associated commit".to_string()],
        },
    }
}
