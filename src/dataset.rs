use std::{io, path::Path};

use anyhow::Context;
use serde::Serialize;

use crate::{
    extract::{Comment, Post},
    reltime::Stamp,
};

/// Written for the parent of a post and the title of a comment.
pub const SENTINEL: i64 = -1;
const SENTINEL_TITLE: &str = "-1";

/// One row of the table. Posts have no parent, comments have no title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: usize,
    pub parent: Option<usize>,
    pub author: String,
    pub date: Option<Stamp>,
    pub votes: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Serialize)]
struct Row<'a> {
    id: usize,
    parent_id: i64,
    author: &'a str,
    date: Option<String>,
    votes: Option<&'a str>,
    title: Option<&'a str>,
    text: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct Dataset {
    records: Vec<Record>,
    n_posts: usize,
}

impl Dataset {
    /// Posts first, then comments, numbered from 1. Fails if a comment points at a post
    /// that was not collected.
    pub fn assemble(posts: Vec<Post>, comments: Vec<Comment>) -> anyhow::Result<Self> {
        let n_posts = posts.len();
        if let Some(orphan) = comments.iter().find(|c| c.parent == 0 || c.parent > n_posts) {
            anyhow::bail!(
                "comment by {} refers to post {} but only {n_posts} posts were collected",
                orphan.author,
                orphan.parent,
            );
        }

        let posts = posts.into_iter().map(|p| Record {
            id: 0,
            parent: None,
            author: p.author,
            date: p.date,
            votes: p.votes,
            title: p.title,
            body: p.body,
        });
        let comments = comments.into_iter().map(|c| Record {
            id: 0,
            parent: Some(c.parent),
            author: c.author,
            date: c.date,
            votes: c.votes,
            title: None,
            body: c.body,
        });

        let records = posts
            .chain(comments)
            .zip(1..)
            .map(|(record, id)| Record { id, ..record })
            .collect();

        Ok(Self { records, n_posts })
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn posts(&self) -> &[Record] {
        &self.records[..self.n_posts]
    }

    #[must_use]
    pub fn comments(&self) -> &[Record] {
        &self.records[self.n_posts..]
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            let title = match record.parent {
                None => record.title.as_deref(),
                Some(_) => Some(SENTINEL_TITLE),
            };
            wtr.serialize(Row {
                id: record.id,
                parent_id: record.parent.map_or(SENTINEL, |p| p as i64),
                author: &record.author,
                date: record.date.map(|d| d.to_string()),
                votes: record.votes.as_deref(),
                title,
                text: record.body.as_deref(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Writes the CSV to `path`, creating missing parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create {}", dir.display()))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        self.write_csv(io::BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::reltime::Precision;

    fn post(author: &str) -> Post {
        Post {
            author: author.to_owned(),
            date: None,
            votes: Some("12".to_owned()),
            title: Some(format!("{author}'s title")),
            body: None,
            comment_link: None,
        }
    }

    fn comment(parent: usize, author: &str) -> Comment {
        Comment {
            parent,
            author: author.to_owned(),
            date: None,
            votes: None,
            body: Some("ok".to_owned()),
        }
    }

    #[test]
    fn ids_and_parents() {
        let ds = Dataset::assemble(
            vec![post("a"), post("b")],
            vec![comment(2, "x"), comment(1, "y"), comment(2, "z")],
        )
        .unwrap();

        let ids = ds.records().iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
        assert_eq!(ds.posts().len(), 2);
        assert!(ds.posts().iter().all(|r| r.parent.is_none()));
        assert!(ds.comments().iter().all(|r| r.title.is_none()));
        for c in ds.comments() {
            let parent = c.parent.unwrap();
            assert!(ds.posts().iter().any(|p| p.id == parent));
        }
    }

    #[test]
    fn rejects_dangling_parent() {
        assert!(Dataset::assemble(vec![post("a")], vec![comment(2, "x")]).is_err());
        assert!(Dataset::assemble(vec![post("a")], vec![comment(0, "x")]).is_err());
        assert!(Dataset::assemble(vec![], vec![comment(1, "x")]).is_err());
    }

    #[test]
    fn csv_layout() {
        let mut p = post("a");
        p.date = NaiveDate::from_ymd_opt(2021, 1, 28)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .map(|at| Stamp::new(at, Precision::Minute));
        let ds = Dataset::assemble(vec![p], vec![comment(1, "x")]).unwrap();

        let mut out = Vec::new();
        ds.write_csv(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines, [
            "id,parent_id,author,date,votes,title,text",
            "1,-1,a,2021-01-28 09:30,12,a's title,",
            "2,1,x,,,-1,ok",
        ]);
    }

    #[test]
    fn save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset").join("wsb_dataset.csv");
        let ds = Dataset::assemble(vec![post("a")], vec![]).unwrap();
        ds.save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("id,parent_id,author,date,votes,title,text\n"));
        assert_eq!(written.lines().count(), 2);
    }
}
