/**
 * SlimBPR
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::fs::File;
use std::io::prelude::*;
use std::io::stdout;
use std::path::Path;

use log::warn;
use serde_derive::Serialize;

use crate::error::Result;
use crate::stats::{DataDictionary, Renaming};
use crate::types::{self, SparseMatrix};

/// Reads a CSV input file. We expect NO headers, and a user-item tuple per line with tab
/// separation, optionally followed by a numeric rating.
pub fn csv_reader(file: &str) -> std::result::Result<csv::Reader<std::fs::File>, csv::Error> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .from_path(file)
}

/// Interactions as `(user, item, rating)`, a missing rating counts as 1. Malformed lines are
/// skipped with a warning.
pub fn interactions_from_csv<'a, R>(
    reader: &'a mut csv::Reader<R>
) -> impl Iterator<Item=(String, String, f32)> + 'a
    where R: std::io::Read {

    reader.records()
        .filter_map(|result| {
            match result {
                Ok(record) => parse_record(&record),
                Err(failure) => {
                    warn!("Skipping unreadable line: {}", failure);
                    None
                },
            }
        })
}

fn parse_record(record: &csv::StringRecord) -> Option<(String, String, f32)> {

    let (user, item) = match (record.get(0), record.get(1)) {
        (Some(user), Some(item)) => (user, item),
        _ => {
            warn!("Skipping line with fewer than two fields: {:?}", record);
            return None;
        },
    };

    let rating = match record.get(2) {
        Some(rating) => match rating.trim().parse::<f32>() {
            Ok(rating) => rating,
            Err(_) => {
                warn!("Skipping line with invalid rating: {:?}", record);
                return None;
            },
        },
        None => 1.0,
    };

    Some((user.to_string(), item.to_string(), rating))
}

/// Builds the users x items matrix for the given interactions. Users or items unknown to the
/// data dictionary are skipped, which allows reading held-out data with the training dictionary.
pub fn interaction_matrix<'a, I>(interactions: I, data_dict: &DataDictionary) -> Result<SparseMatrix>
    where I: Iterator<Item=&'a (String, String, f32)> {

    let mut num_skipped = 0;

    let triplets: Vec<(u32, u32, f32)> = interactions
        .filter_map(|(user, item, rating)| {
            match (data_dict.user_index(user), data_dict.item_index(item)) {
                (Some(user_index), Some(item_index)) => Some((user_index, item_index, *rating)),
                _ => {
                    num_skipped += 1;
                    None
                },
            }
        })
        .collect();

    if num_skipped > 0 {
        warn!("Skipped {} interactions with unknown users or items", num_skipped);
    }

    types::new_sparse_matrix(data_dict.num_users(), data_dict.num_items(), &triplets)
}

/// Struct used for JSON serialization of computed recommendations. Field names will be used in
/// JSON.
#[derive(Serialize)]
struct Recommendations<'a> {
    for_user: &'a str,
    recommended_items: Vec<&'a str>,
}

/// Output the computed recommendations in JSON format, using the original identifiers from the
/// inputfile. If an `recommendations_path` is supplied, we write to a file at the specified path,
/// otherwise, we output to stdout.
pub fn write_recommendations(
    users: &[u32],
    recommendations: &[Vec<u32>],
    renaming: &Renaming,
    recommendations_path: Option<String>,
) -> Result<()> {

    let mut out: Box<dyn Write> = match recommendations_path {
        Some(path) => Box::new(File::create(&Path::new(&path))?),
        _ => Box::new(stdout())
    };

    for (user, recommended_item_indices) in users.iter().zip(recommendations.iter()) {

        let for_user = renaming.user_name(*user);

        let recommended_items: Vec<&str> = recommended_item_indices.iter()
            .map(|item_index| renaming.item_name(*item_index))
            .collect();

        let recommendations_as_json =
            serde_json::to_string(&Recommendations { for_user, recommended_items })?;

        writeln!(out, "{}", recommendations_as_json)?;
    }

    out.flush()?;

    Ok(())
}


#[cfg(test)]
mod tests {

    use crate::io;
    use crate::stats::DataDictionary;

    #[test]
    fn reads_tab_separated_interactions() {
        let data = "alice\tapple\t5\nbob\tpony\nbroken\ncharles\tbike\tmany\n";

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(data.as_bytes());

        let interactions: Vec<(String, String, f32)> =
            io::interactions_from_csv(&mut reader).collect();

        assert_eq!(interactions, vec![
            (String::from("alice"), String::from("apple"), 5.0),
            (String::from("bob"), String::from("pony"), 1.0),
        ]);
    }

    #[test]
    fn unknown_identifiers_are_skipped() {
        let train = vec![
            (String::from("alice"), String::from("apple"), 5.0),
            (String::from("bob"), String::from("pony"), 4.0),
        ];
        let data_dict = DataDictionary::from_interactions(train.iter());

        let test = vec![
            (String::from("alice"), String::from("pony"), 3.0),
            (String::from("dora"), String::from("pony"), 3.0),
            (String::from("bob"), String::from("bike"), 3.0),
        ];

        let matrix = io::interaction_matrix(test.iter(), &data_dict).unwrap();

        assert_eq!(matrix.shape(), (2, 2));
        assert_eq!(matrix.nnz(), 1);
        assert_eq!(matrix.get(0, 1), Some(&3.0));
    }
}
