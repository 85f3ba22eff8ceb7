//! Line filter: keeps the lines of each input file that contain a term.
//!

use crate::utils::string_from_bytes;
use crate::*;
use anyhow::Result;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
struct Args {
    #[clap(short, long, value_parser)]
    term: String,

    /// Match without regard to case.
    #[clap(short, long)]
    ignore_case: bool,
}

impl Args {
    fn matches(&self, line: &str) -> bool {
        if self.ignore_case {
            line.to_lowercase().contains(&self.term.to_lowercase())
        } else {
            line.contains(&self.term)
        }
    }
}

pub fn map(kv: KeyValue, aux: Bytes) -> MapOutput {
    let args: Args = workload::parse_aux(&aux)?;
    let text = string_from_bytes(kv.value)?;
    let file = kv.key;

    let hits = text
        .lines()
        .enumerate()
        .filter(|(_, line)| args.matches(line))
        .map(|(idx, line)| {
            // value layout: big-endian line number, then the line itself
            let mut value = BytesMut::with_capacity(8 + line.len());
            value.put_u64(idx as u64 + 1);
            value.put(line.as_bytes());
            Ok(KeyValue::new(file.clone(), value.freeze()))
        })
        .collect::<Vec<Result<KeyValue>>>();
    Ok(Box::new(hits.into_iter()))
}

pub fn reduce(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let file = string_from_bytes(key)?;
    let mut hits = Vec::new();
    for mut value in values {
        if value.len() < 8 {
            anyhow::bail!("truncated filter record for {file}");
        }
        let line_no = value.get_u64();
        hits.push((line_no, string_from_bytes(value)?));
    }
    hits.sort_by_key(|(line_no, _)| *line_no);

    let mut out = BytesMut::new();
    for (line_no, line) in hits {
        out.put(format!("{file}:{line_no}:: {line}\n").as_bytes());
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aux(args: &[&str]) -> Bytes {
        workload::serialize_aux(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    fn run(text: &'static str, args: &[&str]) -> String {
        let values = map(KeyValue::new("f.txt", text), aux(args))
            .unwrap()
            .map(|kv| kv.unwrap().into_value())
            .collect::<Vec<_>>();
        // reverse to check the reducer restores line order
        let out = reduce(
            Bytes::from("f.txt"),
            Box::new(values.into_iter().rev()),
            Bytes::new(),
        )
        .unwrap();
        string_from_bytes(out).unwrap()
    }

    #[test]
    fn keeps_matching_lines_in_order() {
        let out = run("mobile play\ndesktop play\nmobile skip\n", &["--term", "mobile"]);
        assert_eq!(out, "f.txt:1:: mobile play\nf.txt:3:: mobile skip\n");
    }

    #[test]
    fn ignore_case() {
        let out = run("Mobile\nmobile\nMOBILE\ndesk\n", &["-t", "mobile", "-i"]);
        assert_eq!(out, "f.txt:1:: Mobile\nf.txt:2:: mobile\nf.txt:3:: MOBILE\n");
    }

    #[test]
    fn term_is_required() {
        assert!(map(KeyValue::new("f.txt", "x"), Bytes::new()).is_err());
    }
}
