pub mod q_learning;
