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

use std::env;
use std::error::Error;
use std::fs::File;
use std::str::FromStr;

use getopts::{Matches, Options};
use log::info;

use slimbpr::config::{TrainingConfig, UpdateRule};
use slimbpr::evaluation::RankingEvaluator;
use slimbpr::interactions::{InteractionStore, DEFAULT_POSITIVE_THRESHOLD};
use slimbpr::io;
use slimbpr::learner::{self, Validation};
use slimbpr::recommend::{self, Recommender};
use slimbpr::stats::{DataDictionary, Renaming};

struct Arguments {
    interactions_path: String,
    test_path: Option<String>,
    recommendations_path: Option<String>,
    log_path: Option<String>,
    num_recommendations: usize,
    positive_threshold: f32,
    config: TrainingConfig,
}

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("i", "inputfile", "Input file name (required). The input consists of interactions \
        between user and items. The input file must contain a user, an item and optionally a \
        rating per line, separated by tabs. Missing ratings count as 1.", "PATH");
    opts.optopt("t", "testfile", "Held-out interactions in the same format as the input file \
        (optional). If given, the model is evaluated after every epoch.", "PATH");
    opts.optopt("o", "outputfile", "Output file name (optional, recommendations will be written \
        to stdout by default).", "PATH");
    opts.optopt("", "logfile", "File receiving one line per evaluation (optional).", "PATH");
    opts.optopt("n", "num-recommendations", "Number of items to recommend per user (optional, \
        defaults to 10).", "NUMBER");
    opts.optopt("e", "epochs", "Number of training epochs (optional, defaults to 30).", "NUMBER");
    opts.optopt("b", "batch-size", "Number of samples per SGD step (optional, defaults to \
        1000).", "NUMBER");
    opts.optopt("l", "learning-rate", "SGD learning rate (optional, defaults to 0.05).", "RATE");
    opts.optopt("", "lambda-i", "Regularization of positive items, only used by the loop \
        update rule (optional, defaults to 0.0025).", "RATE");
    opts.optopt("", "lambda-j", "Regularization of negative items, only used by the loop \
        update rule (optional, defaults to 0.00025).", "RATE");
    opts.optopt("k", "topk", "Number of weights to keep per item (optional, all weights are kept \
        by default).", "NUMBER");
    opts.optopt("p", "positive-threshold", "Minimum rating of a positive interaction \
        (optional, defaults to 3).", "RATING");
    opts.optopt("u", "update-rule", "Either 'batch' (default) or 'loop' for the regularized \
        per sample update.", "RULE");
    opts.optopt("s", "seed", "Seed for the random sampling (optional).", "NUMBER");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    if !matches.opt_present("i") {
        return print_usage_and_exit(
            &program,
            opts,
            Some("Please specify an inputfile via --inputfile."),
        );
    }

    let arguments = match parse_arguments(&matches) {
        Ok(arguments) => arguments,
        Err(hint) => return print_usage_and_exit(&program, opts, Some(&hint)),
    };

    if let Err(failure) = train_and_recommend(arguments) {
        eprintln!("\n{}\n", failure);
        std::process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));
}

fn option_or<T>(matches: &Matches, name: &str, default: T) -> Result<T, String>
    where T: FromStr, T::Err: ToString {

    matches.opt_get_default(name, default)
        .map_err(|failure| format!("Problem with option '{}': {}", name, failure.to_string()))
}

fn parse_arguments(matches: &Matches) -> Result<Arguments, String> {

    let defaults = TrainingConfig::default();

    let update_rule = match matches.opt_str("u").as_ref().map(|rule| rule.as_str()) {
        None | Some("batch") => UpdateRule::Batch,
        Some("loop") => UpdateRule::LoopRegularized,
        Some(other) => return Err(format!("Unknown update rule '{}'", other)),
    };

    let top_k: Option<usize> = matches.opt_get::<usize>("k")
        .map_err(|failure| format!("Problem with option 'k': {}", failure.to_string()))?;

    let seed: Option<u64> = matches.opt_get::<u64>("s")
        .map_err(|failure| format!("Problem with option 's': {}", failure.to_string()))?;

    let config = TrainingConfig {
        epochs: option_or(matches, "e", defaults.epochs)?,
        batch_size: option_or(matches, "b", defaults.batch_size)?,
        learning_rate: option_or(matches, "l", defaults.learning_rate)?,
        lambda_i: option_or(matches, "lambda-i", defaults.lambda_i)?,
        lambda_j: option_or(matches, "lambda-j", defaults.lambda_j)?,
        top_k,
        update_rule,
        seed,
        ..defaults
    };

    Ok(Arguments {
        interactions_path: matches.opt_str("i").unwrap_or_default(),
        test_path: matches.opt_str("t"),
        recommendations_path: matches.opt_str("o"),
        log_path: matches.opt_str("logfile"),
        num_recommendations: option_or(matches, "n", 10)?,
        positive_threshold: option_or(matches, "p", DEFAULT_POSITIVE_THRESHOLD)?,
        config,
    })
}

fn read_interactions(path: &str) -> Result<Vec<(String, String, f32)>, Box<dyn Error>> {
    let mut reader = io::csv_reader(path)?;
    Ok(io::interactions_from_csv(&mut reader).collect())
}

fn train_and_recommend(arguments: Arguments) -> Result<(), Box<dyn Error>> {

    info!("Reading {} to compute data statistics", arguments.interactions_path);

    let interactions = read_interactions(&arguments.interactions_path)?;
    let data_dict = DataDictionary::from_interactions(interactions.iter());

    info!(
        "Found {} interactions between {} users and {} items.",
        data_dict.num_interactions(),
        data_dict.num_users(),
        data_dict.num_items(),
    );

    let train = io::interaction_matrix(interactions.iter(), &data_dict)?;
    let store = InteractionStore::new(train, arguments.positive_threshold)?;

    info!("{} of the interactions are positive (rating >= {})",
        store.num_positive_interactions(), arguments.positive_threshold);

    let test = match arguments.test_path {
        Some(ref test_path) => {
            info!("Reading held-out interactions from {}", test_path);
            let test_interactions = read_interactions(test_path)?;
            Some(io::interaction_matrix(test_interactions.iter(), &data_dict)?)
        },
        None => None,
    };

    let mut log_file = match arguments.log_path {
        Some(ref log_path) => Some(File::create(log_path)?),
        None => None,
    };

    let evaluator = RankingEvaluator::default();

    let validation = test.as_ref().map(|test| Validation {
        test,
        evaluator: &evaluator,
        log_sink: log_file.as_mut().map(|file| file as &mut dyn std::io::Write),
    });

    let fitted = learner::fit(&store, arguments.config, validation)?;

    info!("Computing {} recommendations per user", arguments.num_recommendations);

    let recommender = Recommender::new(store.train(), &fitted.similarity)?;
    let users: Vec<u32> = (0..data_dict.num_users() as u32).collect();

    let recommendations = recommend::recommend_all(
        &recommender,
        &users,
        Some(arguments.num_recommendations),
        true,
        num_cpus::get(),
    )?;

    // Build reverse index, make sure we consume the data dictionary
    let renaming: Renaming = data_dict.into();

    info!("Writing recommendations...");
    io::write_recommendations(&users, &recommendations, &renaming, arguments.recommendations_path)?;

    Ok(())
}
