//! Prompt texts for crew generation and database question answering.
//!
//! Every generation prompt asks for exactly one ```json block; the reply is
//! decoded by [`crate::extract`].

use crate::prompt::PromptTemplate;

/// Roster: which agents exist and which task goes to whom.
///
/// Placeholders: `objective`, `tool_names`.
pub const CREW_ROSTER: PromptTemplate = PromptTemplate::new(
    "crew_roster",
    r#"Here's an example of a crew config for building a landing page for a plant shop:
```json
{{
    "agents": ["content_writer", "web_designer", "web_developer", "seo_specialist"],
    "tasks": [
        {{"task": "write_plant_descriptions", "agent": "content_writer"}},
        {{"task": "design_page_layout", "agent": "web_designer"}},
        {{"task": "select_images", "agent": "web_designer"}},
        {{"task": "write_about_us", "agent": "content_writer"}},
        {{"task": "build_webpage", "agent": "web_developer"}},
        {{"task": "implement_seo_practices", "agent": "seo_specialist"}},
        {{"task": "setup_contact_form", "agent": "web_developer"}},
        {{"task": "launch_page_review", "agent": "web_designer"}}
    ]
}}
```

# Task
Create a list of agents and tasks that would complete the following objective: {objective}
The output should be a config in the form of a JSON object:
```json
{{"agents": ["agent1", "agent2", ...], "tasks": [{{"task": "...", "agent": "agent1"}}, ...]}}
```

Ensure that the agents and tasks are relevant to the objective and that the agents have the necessary skills to complete the tasks.
Remember that each task must be delegated to an agent listed in "agents". Do not create a task that cannot be completed by any of the agents.
Tasks and agent capabilities should be within the abilities of a programmer with access to the internet and a powerful LLM.

# Available tools
Here's a list of tools the agents can use to complete their tasks.
Note that if a step involves analyzing data, there needs to be a task that involves acquiring the data:
{tool_names}

# Your crew config
"#,
);

/// Agent detail for one roster entry.
///
/// Placeholders: `objective`, `name`, `agent_tasks`, `tool_names`.
pub const AGENT_CONFIG: PromptTemplate = PromptTemplate::new(
    "agent_config",
    r#"# Instructions
The overall objective of the larger program is: {objective}
Create a config for an agent with the name {name}, in the format below.
The agent will have to complete the following tasks: {agent_tasks}
The agent may make use of any of the following tools: {tool_names}

ENSURE THAT YOUR CONFIG IS A JSON OBJECT WITH THE KEYS BELOW.
Here's an example of a config for a simple agent:
```json
{{
    "role": "Unicorn Hunter",
    "goal": "Discover and capture mythical unicorns for study and conservation",
    "backstory": "You are part of an ancient society dedicated to the preservation and study of unicorns. With a deep understanding of mythical creatures and their habitats, you embark on expeditions into enchanted forests. Your skills in tracking, magical lore, and non-lethal capture techniques are unparalleled.",
    "verbose": true,
    "allow_delegation": false,
    "tools": ["enchanted_net", "potion_brewing_kit", "ancient_tome_of_lore"]
}}
```

Only list tools from the available tools above.
Do not duplicate tasks. If a task is already assigned to another agent, do not assign it to this agent.

# Your agent config for {name}
"#,
);

/// Task detail for one roster task.
///
/// Placeholders: `objective`, `task_description`, `agent_role`, `tool_names`.
pub const TASK_CONFIG: PromptTemplate = PromptTemplate::new(
    "task_config",
    r#"# Instructions
The overall objective of the larger program is: {objective}
Create a config for a task with the following description: {task_description}
The task should be delegated to the following agent: {agent_role}
The agent will have access to the following tools: {tool_names}

ENSURE THAT YOUR CONFIG IS A JSON OBJECT with the keys "description" and "agent" only.
Here's an example of a config for a simple task:
```json
{{
    "description": "Conduct a comprehensive analysis of the latest advancements in AI in 2024.\nIdentify key trends, breakthrough technologies, and potential industry impacts.\nYour final answer MUST be a full analysis report",
    "agent": "researcher"
}}
```

# Your task config for {task_description}
"#,
);

/// Repair a snippet that no longer parses.
///
/// Placeholders: `language_or_file_type`, `code_snippet`.
pub const CODE_FIXER: PromptTemplate = PromptTemplate::new(
    "code_fixer",
    r#"# Task
Refine the formatting and fix any error in the given code snippet.
Your primary goal is to ensure that the code will parse successfully without any errors.
Ensure brackets, quotes, and parentheses are balanced and properly nested.
If the code is already well-formatted, return it unchanged.
ONLY OUTPUT THE FIXED OR UNCHANGED CODE, inside a single fenced block.

# Language/File Type
{language_or_file_type}

# Input code snippet
```
{code_snippet}
```

# Output code snippet
"#,
);

/// Natural-language question to one SQL query over a known table.
///
/// Placeholders: `question`, `table_name`, `table_sample`.
pub const QUESTION_TO_QUERY: PromptTemplate = PromptTemplate::new(
    "question_to_query",
    r#"# Context
Your job is to write a sql query that answers the following question:
{question}

Below is a list of columns and sample values. Your query should only use the data contained in the table. The table name is `{table_name}`.

# Columns and sample values
{table_sample}

If the question is not a question or is not answerable with the given columns, respond to the best of your ability.
Do not use columns that aren't in the table.
Ensure that the query runs and returns the correct output.

# Your query:
"#,
);

/// Query results to a short answer.
///
/// Placeholders: `question`, `table_name`, `query_results_table`.
pub const RESULTS_TO_ANSWER: PromptTemplate = PromptTemplate::new(
    "results_to_answer",
    r#"# Task
Based on the results of a SQL query, provide a brief summary of the key findings and explicitly answer the following question:
{question}

The query results from the table `{table_name}` are as follows:

# Query Results Table
{query_results_table}

In 2-5 sentences, summarize the main insights from the query results and give a clear and direct answer to the original question.

# Summary and Answer:
"#,
);

/// System prompt for the SQL agent's tool loop.
///
/// Placeholders: `top_k`.
pub const SQL_AGENT_SYSTEM: PromptTemplate = PromptTemplate::new(
    "sql_agent_system",
    r#"You are an agent designed to interact with a SQL database.
Given an input question, create a syntactically correct SQLite query to run, then look at the results of the query and return the answer.
Unless the user specifies a specific number of examples they wish to obtain, always limit your query to at most {top_k} results.
Never query for all the columns from a specific table, only ask for the relevant columns given the question.
Always start by listing the tables, then look at the schema of the most relevant tables.
Double check your query with the checker tool before executing it.
If you get an error while executing a query, rewrite the query and try again.
DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the database.
"#,
);

/// Ask the model to double-check a query before it runs.
///
/// Placeholders: `dialect`, `query`.
pub const SQL_QUERY_CHECKER: PromptTemplate = PromptTemplate::new(
    "sql_query_checker",
    r#"{query}
Double check the {dialect} query above for common mistakes, including:
- Using NOT IN with NULL values
- Using UNION when UNION ALL should have been used
- Using BETWEEN for exclusive ranges
- Data type mismatch in predicates
- Properly quoting identifiers
- Using the correct number of arguments for functions
- Casting to the correct data type
- Using the proper columns for joins

If there are any of the above mistakes, rewrite the query. If there are no mistakes, just reproduce the original query.

Output the final SQL query only, inside a ```sql block.
"#,
);

/// Every template, for listing and validation
pub const ALL: &[PromptTemplate] = &[
    CREW_ROSTER,
    AGENT_CONFIG,
    TASK_CONFIG,
    CODE_FIXER,
    QUESTION_TO_QUERY,
    RESULTS_TO_ANSWER,
    SQL_AGENT_SYSTEM,
    SQL_QUERY_CHECKER,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_are_well_formed() {
        for template in ALL {
            assert!(template.placeholders().is_ok(), "{} is malformed", template.name());
        }
    }

    #[test]
    fn test_generation_placeholders() {
        assert_eq!(CREW_ROSTER.placeholders().unwrap(), vec!["objective", "tool_names"]);
        assert_eq!(
            AGENT_CONFIG.placeholders().unwrap(),
            vec!["objective", "name", "agent_tasks", "tool_names"]
        );
        assert_eq!(
            TASK_CONFIG.placeholders().unwrap(),
            vec!["objective", "task_description", "agent_role", "tool_names"]
        );
    }
}
