//! Background worker: the periodic jobs maintaining the area/category
//! trees and the generated firing-exercise messages.

pub mod tree_sort;
