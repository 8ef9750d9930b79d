mod bash;
mod policy_view;
mod set_cwd;
