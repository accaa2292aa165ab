use std::collections::BTreeSet;

use mucore::algorithm::asymmetry::pair_asymmetry;
use mucore::data::spectrum::Spectrum;

fn main() {
    // Example: pairwise asymmetry of one forward and one backward bin
    let forward = Spectrum::new(vec![0.0, 1.0], vec![10.0], vec![10.0_f64.sqrt()], BTreeSet::from([1]));
    let backward = Spectrum::new(vec![0.0, 1.0], vec![2.0], vec![2.0_f64.sqrt()], BTreeSet::from([2]));

    match pair_asymmetry(&forward, &backward, 1.0) {
        Ok(pair) => {
            println!("Asymmetry: {:?}", pair.y);
            println!("Error: {:?}", pair.e);
        }
        Err(err) => println!("Error: {}", err),
    }
}
