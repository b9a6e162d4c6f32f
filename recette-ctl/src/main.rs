use std::{
    fmt::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use recette_client::{
    api::{DishDump, UserId, Uuid},
    audit, build_tree, CommentNode, CommentTree,
};

#[derive(structopt::StructOpt)]
struct Opt {
    /// User whose own reactions get highlighted
    #[structopt(short, long, env = "RECETTE_VIEWER")]
    viewer: Option<Uuid>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the comment tree of a dish dump
    Tree {
        /// JSON dump, as output by generate-test-data
        dump: PathBuf,

        /// Only print this page of top-level comments (1-based)
        #[structopt(long)]
        page: Option<usize>,

        #[structopt(long, default_value = "10")]
        per_page: usize,

        /// Output JSON instead of text
        #[structopt(long)]
        json: bool,
    },

    /// List the inconsistencies of a dish dump
    Check {
        /// JSON dump, as output by generate-test-data
        dump: PathBuf,
    },
}

fn read_dump(path: &Path) -> anyhow::Result<DishDump> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading dump file {:?}", path))?;
    serde_json::from_str(&data).with_context(|| format!("parsing dump file {:?}", path))
}

fn write_nodes(out: &mut String, nodes: &[CommentNode]) -> std::fmt::Result {
    let mut stack = nodes.iter().rev().collect::<Vec<_>>();
    while let Some(n) = stack.pop() {
        let c = &n.comment;
        write!(
            out,
            "{:indent$}- {} at {}: {}",
            "",
            c.author_id.0,
            c.created_at.format("%Y-%m-%d %H:%M"),
            c.content,
            indent = 2 * n.depth,
        )?;
        let counts = n
            .reaction_summary
            .reaction_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(t, count)| format!("{t} {count}"))
            .collect::<Vec<_>>();
        if !counts.is_empty() {
            write!(out, " [{}]", counts.join(", "))?;
        }
        if let Some(r) = &n.reaction_summary.viewer_reaction {
            write!(out, " (you: {})", r.reaction_type)?;
        }
        writeln!(out)?;
        stack.extend(n.children.iter().rev());
    }
    Ok(())
}

fn tree_output(
    tree: &CommentTree,
    page: Option<usize>,
    per_page: usize,
    json: bool,
) -> anyhow::Result<String> {
    let mut out = String::new();
    match (page, json) {
        (None, true) => out = serde_json::to_string_pretty(tree).context("serializing tree")?,
        (Some(page), true) => {
            out = serde_json::to_string_pretty(&tree.paginate(page, per_page))
                .context("serializing page")?
        }
        (None, false) => {
            writeln!(
                out,
                "{} comments, {} threads",
                tree.total_comment_count, tree.total_root_count
            )?;
            write_nodes(&mut out, &tree.roots)?;
        }
        (Some(page), false) => {
            let p = tree.paginate(page, per_page);
            let skipped = (p.page - 1).saturating_mul(p.per_page);
            match p.items.len() {
                0 => writeln!(out, "no threads on page {}, {} in total", p.page, p.total)?,
                n => writeln!(
                    out,
                    "threads {}-{} of {}",
                    skipped + 1,
                    skipped + n,
                    p.total
                )?,
            }
            write_nodes(&mut out, &p.items)?;
        }
    }
    Ok(out)
}

/// Returns the report along with the number of anomalies found
fn check_output(dump: &DishDump) -> anyhow::Result<(String, usize)> {
    let anomalies = audit(&dump.comments, &dump.reactions);
    let mut out = String::new();
    for a in anomalies.iter() {
        writeln!(out, "{a}")?;
    }
    Ok((out, anomalies.len()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let viewer = opt.viewer.map(UserId);

    match opt.cmd {
        Command::Tree {
            dump,
            page,
            per_page,
            json,
        } => {
            let dump = read_dump(&dump)?;
            let tree = build_tree(&dump.comments, &dump.reactions_by_comment(), viewer);
            let num_active = dump.comments.iter().filter(|c| c.is_active).count();
            if num_active > tree.total_comment_count {
                tracing::info!(
                    num_hidden = num_active - tree.total_comment_count,
                    "some comments are unreachable from the top level, run `check` for details"
                );
            }
            print!("{}", tree_output(&tree, page, per_page, json)?);
        }
        Command::Check { dump } => {
            let dump = read_dump(&dump)?;
            let (report, num_anomalies) = check_output(&dump)?;
            print!("{report}");
            if num_anomalies > 0 {
                anyhow::bail!("found {num_anomalies} anomalies in dish {}", dump.dish_id.0);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write as _};

    use chrono::{TimeZone, Utc};
    use recette_client::api::{
        Comment, CommentId, DishId, Reaction, ReactionId, ReactionType,
    };

    use super::*;

    fn comment(id: u128, parent: Option<u128>, minute: u32) -> Comment {
        let at = Utc.with_ymd_and_hms(2022, 11, 2, 12, minute, 0).unwrap();
        Comment {
            id: CommentId(Uuid::from_u128(id)),
            dish_id: DishId::stub(),
            author_id: UserId(Uuid::from_u128(0xa)),
            parent_id: parent.map(|p| CommentId(Uuid::from_u128(p))),
            content: format!("comment {id}"),
            created_at: at,
            updated_at: at,
            is_active: true,
        }
    }

    fn sample_dump() -> DishDump {
        let viewer = UserId(Uuid::from_u128(0xb));
        DishDump {
            dish_id: DishId::stub(),
            comments: vec![
                comment(3, Some(1), 3),
                comment(2, None, 2),
                comment(1, None, 1),
            ],
            reactions: vec![Reaction {
                id: ReactionId(Uuid::from_u128(0x100)),
                comment_id: CommentId(Uuid::from_u128(1)),
                user_id: viewer,
                reaction_type: ReactionType::Love,
                created_at: Utc.with_ymd_and_hms(2022, 11, 2, 13, 0, 0).unwrap(),
            }],
        }
    }

    fn write_dump(dump: &DishDump) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(serde_json::to_string(dump).unwrap().as_bytes())
            .unwrap();
        f
    }

    #[test]
    fn renders_indented_tree() {
        let f = write_dump(&sample_dump());
        let dump = read_dump(f.path()).unwrap();
        let tree = build_tree(
            &dump.comments,
            &dump.reactions_by_comment(),
            Some(UserId(Uuid::from_u128(0xb))),
        );
        let author = Uuid::from_u128(0xa);
        assert_eq!(
            tree_output(&tree, None, 10, false).unwrap(),
            format!(
                "3 comments, 2 threads\n\
                 - {author} at 2022-11-02 12:02: comment 2\n\
                 - {author} at 2022-11-02 12:01: comment 1 [love 1] (you: love)\n  \
                 - {author} at 2022-11-02 12:03: comment 3\n"
            )
        );
        assert_eq!(
            tree_output(&tree, Some(2), 1, false).unwrap(),
            format!(
                "threads 2-2 of 2\n\
                 - {author} at 2022-11-02 12:01: comment 1 [love 1] (you: love)\n  \
                 - {author} at 2022-11-02 12:03: comment 3\n"
            )
        );
        let page: recette_client::api::Paginated<CommentNode> =
            serde_json::from_str(&tree_output(&tree, Some(1), 1, true).unwrap()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items, tree.roots[..1].to_vec());
    }

    #[test]
    fn pages_past_the_end_are_empty() {
        let dump = sample_dump();
        let tree = build_tree(&dump.comments, &dump.reactions_by_comment(), None);
        assert_eq!(
            tree_output(&tree, Some(3), 1, false).unwrap(),
            "no threads on page 3, 2 in total\n"
        );
        assert_eq!(
            tree_output(&tree, Some(usize::MAX), usize::MAX, false).unwrap(),
            format!("no threads on page {}, 2 in total\n", usize::MAX)
        );
        assert_eq!(
            tree_output(&tree, Some(1), 0, false).unwrap(),
            "no threads on page 1, 2 in total\n"
        );
    }

    #[test]
    fn deep_reply_chain_renders() {
        const DEPTH: u128 = 5_000;
        let mut comments = vec![comment(0, None, 0)];
        for i in 1..DEPTH {
            comments.push(comment(i, Some(i - 1), (i % 60) as u32));
        }
        let tree = build_tree(&comments, &HashMap::new(), None);
        let out = tree_output(&tree, None, 10, false).unwrap();
        assert_eq!(out.lines().count(), DEPTH as usize + 1);
        let last = out.lines().last().unwrap();
        assert_eq!(last.len() - last.trim_start().len(), 2 * (DEPTH as usize - 1));
        assert!(last.ends_with(&format!("comment {}", DEPTH - 1)));
    }

    #[test]
    fn check_reports_anomalies() {
        let mut dump = sample_dump();
        assert_eq!(check_output(&dump).unwrap(), (String::new(), 0));

        dump.comments.push(comment(4, Some(42), 4));
        let f = write_dump(&dump);
        let dump = read_dump(f.path()).unwrap();
        let (report, num) = check_output(&dump).unwrap();
        assert_eq!(num, 1);
        assert!(report.contains("replies to unknown comment"));
    }

    #[test]
    fn missing_dump_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_dump(&dir.path().join("nope.json")).unwrap_err();
        assert!(format!("{err:#}").contains("reading dump file"));
    }
}
